//! Notification surface seam.
//!
//! Where confirmation notices are published and where the principal's
//! answers come back from. A chat channel in production, a console or a
//! scripted double elsewhere.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::platform::UserId;

/// Opaque id of a published message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle(pub String);

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A symbolic marker added to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub user_id: UserId,
    pub is_bot: bool,
    pub symbol: String,
}

/// A text reply addressed to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEvent {
    pub user_id: UserId,
    pub is_bot: bool,
    pub content: String,
}

/// Stream of events scoped to one published message.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Identifier of the surface (channel) for logs.
    fn surface_id(&self) -> String;

    /// Post a new message.
    async fn publish(&self, content: &str) -> Result<MessageHandle, PlatformError>;

    /// Replace the content of a published message.
    async fn edit(&self, handle: &MessageHandle, content: &str) -> Result<(), PlatformError>;

    /// Attach the given markers so users can click them.
    async fn add_markers(&self, handle: &MessageHandle, markers: &[&str])
    -> Result<(), PlatformError>;

    /// Markers added to `handle` by anyone, from now on.
    async fn reactions(
        &self,
        handle: &MessageHandle,
    ) -> Result<EventStream<ReactionEvent>, PlatformError>;

    /// Replies to `handle` by anyone, from now on.
    async fn replies(&self, handle: &MessageHandle)
    -> Result<EventStream<ReplyEvent>, PlatformError>;
}
