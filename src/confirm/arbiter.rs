//! The confirmation race.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinSet;

use crate::ops::Arguments;
use crate::platform::{GuildId, UserId};

use super::describe::{
    CANCEL_MARKER, CONFIRM_MARKER, describe, marker_verdict, parse_reply, render_notice,
    render_outcome,
};
use super::surface::{EventStream, NotificationSurface, ReactionEvent, ReplyEvent};
use super::{Decision, DecisionSlot, DecisionSource, PendingConfirmation, PendingConfirmations, Verdict};

/// The identity asking for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub display_name: String,
    /// Holds the administrator capability on the target server.
    pub is_administrator: bool,
}

impl Principal {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            is_administrator: false,
        }
    }

    pub fn administrator(mut self) -> Self {
        self.is_administrator = true;
        self
    }
}

/// One dangerous operation awaiting a verdict.
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    pub operation: String,
    pub arguments: Arguments,
    pub principal: Principal,
    pub guild_id: GuildId,
    pub timeout: Duration,
}

/// Who may answer a notice.
#[derive(Debug, Clone, Copy)]
struct Responder {
    principal: UserId,
    bot_id: UserId,
}

impl Responder {
    fn accepts(&self, user_id: UserId, is_bot: bool) -> bool {
        !is_bot && user_id != self.bot_id && user_id == self.principal
    }
}

/// Publishes a notice, arms the reaction and reply listeners against a
/// shared deadline and returns the single decision that wins.
///
/// ```text
///   authorize ──no──► Denied (nothing published)
///       │
///   register pending (supersedes older) ─► publish notice
///       │
///   ┌───┴──────────────┐
///   ▼                  ▼
///  reactions task   replies task      deadline
///   │                  │                 │
///   └──► slot.try_resolve ◄──────────────┘   first writer wins
///                │
///   abort listeners ─► remove pending ─► edit notice ─► Decision
/// ```
pub struct ConfirmationArbiter {
    owner_id: UserId,
    bot_id: UserId,
    pending: Arc<PendingConfirmations>,
}

impl ConfirmationArbiter {
    pub fn new(owner_id: UserId, bot_id: UserId, pending: Arc<PendingConfirmations>) -> Self {
        Self {
            owner_id,
            bot_id,
            pending,
        }
    }

    /// Owner or administrator.
    pub fn is_authorized(&self, principal: &Principal) -> bool {
        principal.user_id == self.owner_id || principal.is_administrator
    }

    pub fn pending(&self) -> &Arc<PendingConfirmations> {
        &self.pending
    }

    pub async fn request_confirmation(
        &self,
        request: ConfirmationRequest,
        surface: Arc<dyn NotificationSurface>,
    ) -> Decision {
        let principal_id = request.principal.user_id;
        if !self.is_authorized(&request.principal) {
            tracing::warn!(
                principal = principal_id,
                operation = %request.operation,
                "Confirmation refused: principal is neither owner nor administrator"
            );
            return Decision::new(Verdict::Denied, DecisionSource::Unauthorized);
        }

        let description = describe(&request.operation, &request.arguments);
        let pending = PendingConfirmation::new(
            principal_id,
            request.guild_id,
            request.operation.clone(),
            request.arguments,
            request.timeout,
        );
        let pending_id = pending.id;
        let deadline = pending.deadline;
        let slot = Arc::clone(&pending.slot);
        self.pending.register(pending).await;

        let handle = match surface
            .publish(&render_notice(&description, request.timeout))
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    surface = %surface.surface_id(),
                    error = %e,
                    "Failed to publish confirmation notice"
                );
                let decision = slot.settle(Decision::new(Verdict::Denied, DecisionSource::Unavailable));
                self.pending.remove(principal_id, pending_id).await;
                return decision;
            }
        };

        let responder = Responder {
            principal: principal_id,
            bot_id: self.bot_id,
        };
        let mut listeners = JoinSet::new();

        match surface.replies(&handle).await {
            Ok(stream) => {
                listeners.spawn(listen_replies(stream, Arc::clone(&slot), responder));
            }
            Err(e) => tracing::warn!(notice = %handle, error = %e, "Reply listener unavailable"),
        }

        match surface.add_markers(&handle, &[CONFIRM_MARKER, CANCEL_MARKER]).await {
            Ok(()) => match surface.reactions(&handle).await {
                Ok(stream) => {
                    listeners.spawn(listen_reactions(stream, Arc::clone(&slot), responder));
                }
                Err(e) => {
                    tracing::warn!(notice = %handle, error = %e, "Reaction listener unavailable")
                }
            },
            Err(e) => tracing::warn!(
                notice = %handle,
                error = %e,
                "Failed to add confirmation markers, only replies are armed"
            ),
        }

        let decision = if listeners.is_empty() {
            slot.settle(Decision::new(Verdict::Denied, DecisionSource::Unavailable))
        } else {
            match tokio::time::timeout_at(deadline, slot.wait()).await {
                Ok(decision) => decision,
                Err(_) => slot.settle(Decision::timed_out()),
            }
        };

        listeners.abort_all();
        self.pending.remove(principal_id, pending_id).await;

        if let Err(e) = surface
            .edit(&handle, &render_outcome(&description, &decision))
            .await
        {
            tracing::warn!(notice = %handle, error = %e, "Failed to update confirmation notice");
        }

        tracing::info!(
            principal = principal_id,
            operation = %request.operation,
            verdict = %decision.verdict,
            source = ?decision.source,
            "Confirmation resolved"
        );
        decision
    }
}

async fn listen_reactions(
    mut events: EventStream<ReactionEvent>,
    slot: Arc<DecisionSlot>,
    responder: Responder,
) {
    while let Some(event) = events.next().await {
        if !responder.accepts(event.user_id, event.is_bot) {
            tracing::debug!(user = event.user_id, "Ignoring reaction from another user");
            continue;
        }
        let Some(verdict) = marker_verdict(&event.symbol) else {
            continue;
        };
        slot.try_resolve(Decision::by(verdict, DecisionSource::Reaction, event.user_id));
        return;
    }
}

async fn listen_replies(
    mut events: EventStream<ReplyEvent>,
    slot: Arc<DecisionSlot>,
    responder: Responder,
) {
    while let Some(event) = events.next().await {
        if !responder.accepts(event.user_id, event.is_bot) {
            tracing::debug!(user = event.user_id, "Ignoring reply from another user");
            continue;
        }
        let Some(verdict) = parse_reply(&event.content) else {
            continue;
        };
        slot.try_resolve(Decision::by(verdict, DecisionSource::Reply, event.user_id));
        return;
    }
}
