//! Outstanding confirmations, one per principal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::ops::Arguments;
use crate::platform::{GuildId, UserId};

use super::{Decision, DecisionSlot};

/// A dangerous operation waiting for its principal's answer.
///
/// Clones share the same [`DecisionSlot`].
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub id: Uuid,
    pub principal: UserId,
    pub guild_id: GuildId,
    pub operation: String,
    pub arguments: Arguments,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Monotonic instant at which the wait ends; matches `expires_at`.
    pub deadline: Instant,
    pub slot: Arc<DecisionSlot>,
}

impl PendingConfirmation {
    pub fn new(
        principal: UserId,
        guild_id: GuildId,
        operation: impl Into<String>,
        arguments: Arguments,
        timeout: Duration,
    ) -> Self {
        let deadline = Instant::now() + timeout;
        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| created_at.checked_add_signed(d))
            .unwrap_or(created_at);
        Self {
            id: Uuid::new_v4(),
            principal,
            guild_id,
            operation: operation.into(),
            arguments,
            created_at,
            expires_at,
            deadline,
            slot: Arc::new(DecisionSlot::new()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.is_resolved()
    }
}

/// Principal -> pending confirmation. Owned by the dispatcher and shared
/// with the arbiter.
#[derive(Debug, Default)]
pub struct PendingConfirmations {
    inner: Mutex<HashMap<UserId, PendingConfirmation>>,
}

impl PendingConfirmations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `pending`, superseding any confirmation the same principal
    /// still has open. Returns the replaced entry.
    pub async fn register(&self, pending: PendingConfirmation) -> Option<PendingConfirmation> {
        let mut map = self.inner.lock().await;
        let previous = map.insert(pending.principal, pending);
        if let Some(old) = &previous
            && old.slot.try_resolve(Decision::superseded())
        {
            tracing::info!(
                principal = old.principal,
                operation = %old.operation,
                confirmation = %old.id,
                "Superseded pending confirmation"
            );
        }
        previous
    }

    /// Cancel the principal's outstanding confirmation, if any.
    ///
    /// Returns `true` when an unresolved confirmation was cancelled.
    pub async fn supersede(&self, principal: UserId) -> bool {
        let Some(old) = self.inner.lock().await.remove(&principal) else {
            return false;
        };
        let cancelled = old.slot.try_resolve(Decision::superseded());
        if cancelled {
            tracing::info!(
                principal,
                operation = %old.operation,
                confirmation = %old.id,
                "Superseded pending confirmation"
            );
        }
        cancelled
    }

    /// Drop the entry for `principal` only if it is still confirmation `id`.
    pub async fn remove(&self, principal: UserId, id: Uuid) -> bool {
        let mut map = self.inner.lock().await;
        if map.get(&principal).is_some_and(|p| p.id == id) {
            map.remove(&principal);
            true
        } else {
            false
        }
    }

    /// Snapshot of the principal's entry.
    pub async fn get(&self, principal: UserId) -> Option<PendingConfirmation> {
        self.inner.lock().await.get(&principal).cloned()
    }

    /// Snapshot of every entry, safe to hold across suspension points.
    pub async fn snapshot(&self) -> Vec<PendingConfirmation> {
        self.inner.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
