//! Chat platform collaborator.
//!
//! The dispatcher never talks to a platform SDK directly. It goes through
//! [`Platform`], which exposes one generic `invoke` entry point keyed by
//! catalog operation name plus the few structural lookups that compound
//! operations need. [`HandlerTable`] maps each catalog operation to how it
//! is executed and is validated against the registry at startup.

mod compound;
mod handlers;
pub mod memory;

pub use compound::{delete_category_and_channels, render_api_status};
pub use handlers::{Handler, HandlerTable};
pub use memory::MemoryPlatform;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::ops::Arguments;

/// Server (guild) identifier.
pub type GuildId = u64;

/// User identifier.
pub type UserId = u64;

/// Channel identifier.
pub type ChannelId = u64;

/// A channel as seen by compound operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub name: String,
}

/// A category with the channels it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: ChannelId,
    pub name: String,
    pub channels: Vec<ChannelRef>,
}

/// Platform client seam.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Run a catalog operation and return a human-readable result.
    async fn invoke(&self, operation: &str, arguments: &Arguments) -> Result<String, PlatformError>;

    /// Find a category by name (case-insensitive) with its channels.
    async fn find_category(&self, guild_id: GuildId, name: &str)
    -> Result<CategoryRef, PlatformError>;

    /// Delete a channel or category by id.
    async fn delete_channel_by_id(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), PlatformError>;

    /// Display name of a server.
    async fn guild_name(&self, guild_id: GuildId) -> Result<String, PlatformError>;
}
