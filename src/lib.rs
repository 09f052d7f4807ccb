//! Warden: natural-language administration for chat servers.
//!
//! A user writes "delete the channels called old-logs and tmp" and Warden
//! turns it into catalog operations, asks for confirmation before anything
//! destructive, runs them against the platform and reports per-item results.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Commands  (/askai, ¬askai, /deletecategory, /createrole)         │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      Dispatch Orchestrator                        │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌───────────────────┐  │
//! │  │ LLM failover │──▶│ Intent Resolver  │──▶│ Operation Registry│  │
//! │  │   chain      │   │ (pattern backup) │   │  + handler table  │  │
//! │  └──────────────┘   └──────────────────┘   └─────────┬─────────┘  │
//! │                                                      ▼            │
//! │                 ┌──────────────────────┐   ┌───────────────────┐  │
//! │                 │ Confirmation Arbiter │◀──│ dangerous?        │  │
//! │                 │ (reaction │ reply │  │   └───────────────────┘  │
//! │                 │  deadline │ newer)   │                          │
//! │                 └──────────┬───────────┘                          │
//! └────────────────────────────┼──────────────────────────────────────┘
//!                              ▼
//!                    Platform / Notification surface
//! ```

pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod llm;
pub mod ops;
pub mod platform;
pub mod testing;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::commands::{CommandRouter, Origin, SlashCommand, chunk_response};
    pub use crate::config::Config;
    pub use crate::confirm::{
        ConfirmationArbiter, Decision, NotificationSurface, Principal, Verdict,
    };
    pub use crate::dispatch::{Dispatcher, Request};
    pub use crate::error::{Error, Result};
    pub use crate::intent::{IntentResolver, Resolution, ResolvedInvocation};
    pub use crate::llm::LlmProvider;
    pub use crate::ops::{OperationRegistry, OperationSpec};
    pub use crate::platform::Platform;
}
