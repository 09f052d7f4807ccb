//! Confirmation arbiter for dangerous operations.
//!
//! A pending confirmation moves `Created -> {Confirmed | Denied | TimedOut}`
//! exactly once. Everything that can end it (a reaction, a reply, the
//! deadline, a newer command from the same principal) goes through the
//! same write-once [`DecisionSlot`].

mod arbiter;
mod describe;
mod pending;
mod slot;
mod surface;

pub use arbiter::{ConfirmationArbiter, ConfirmationRequest, Principal};
pub use describe::{
    CANCEL_MARKER, CONFIRM_MARKER, describe, marker_verdict, parse_reply, render_notice,
    render_outcome,
};
pub use pending::{PendingConfirmation, PendingConfirmations};
pub use slot::DecisionSlot;
pub use surface::{EventStream, MessageHandle, NotificationSurface, ReactionEvent, ReplyEvent};

use serde::Serialize;

use crate::platform::UserId;

/// Terminal state of a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Confirmed,
    Denied,
    TimedOut,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Confirmed => "confirmed",
            Verdict::Denied => "denied",
            Verdict::TimedOut => "timed_out",
        };
        write!(f, "{}", s)
    }
}

/// What produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Reaction,
    Reply,
    Deadline,
    /// A newer command from the same principal.
    Superseded,
    /// Principal is neither owner nor administrator.
    Unauthorized,
    /// The notice could not be published or no listener could be armed.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub source: DecisionSource,
    pub resolved_by: Option<UserId>,
}

impl Decision {
    pub fn new(verdict: Verdict, source: DecisionSource) -> Self {
        Self {
            verdict,
            source,
            resolved_by: None,
        }
    }

    pub fn by(verdict: Verdict, source: DecisionSource, user_id: UserId) -> Self {
        Self {
            verdict,
            source,
            resolved_by: Some(user_id),
        }
    }

    pub fn superseded() -> Self {
        Self::new(Verdict::Denied, DecisionSource::Superseded)
    }

    pub fn timed_out() -> Self {
        Self::new(Verdict::TimedOut, DecisionSource::Deadline)
    }

    pub fn is_confirmed(&self) -> bool {
        self.verdict == Verdict::Confirmed
    }
}
