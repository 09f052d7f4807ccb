//! Per-principal target server tracking and the cross-context guard.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::Mutex;

use crate::confirm::PendingConfirmation;
use crate::platform::{GuildId, UserId};

/// Whole-word phrases that let a request leave the principal's server.
const CROSS_SERVER_KEYWORDS: &[&str] = &[
    "clone",
    "duplicate",
    "copy",
    "transfer",
    "from here to another",
    "to another server",
];

static CROSS_SERVER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let alternatives = CROSS_SERVER_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).ok()
});

static SERVER_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b\d{15,20}\b").ok());

/// Text asks to work between servers.
pub fn mentions_cross_server(text: &str) -> bool {
    CROSS_SERVER.as_ref().is_some_and(|re| re.is_match(text))
}

/// First snowflake-sized number in `text`.
pub fn explicit_server_id(text: &str) -> Option<GuildId> {
    SERVER_ID
        .as_ref()?
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// The server a principal is currently working in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFocus {
    pub guild_id: GuildId,
    pub guild_name: String,
}

/// Why a request was refused before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextRejection {
    /// The principal is focused on another server and the request is not
    /// a cross-server one.
    OtherServer { focus: ServerFocus },
    /// The principal still has a confirmation open in another server.
    Interleaved {
        pending_guild: GuildId,
        pending_operation: String,
    },
}

impl ContextRejection {
    pub fn message(&self) -> String {
        match self {
            Self::OtherServer { focus } => format!(
                "🚫 I'm currently focused on **{}** (`{}`). Continue the conversation there, \
                 or use a cross-server command such as `clone` to work between servers.",
                focus.guild_name, focus.guild_id
            ),
            Self::Interleaved {
                pending_guild,
                pending_operation,
            } => format!(
                "🚫 You still have `{pending_operation}` waiting for confirmation in server \
                 `{pending_guild}`. Answer it there or let it expire before working on \
                 another server."
            ),
        }
    }
}

/// Check a request against the principal's focus and open confirmation.
///
/// An open confirmation in another server always refuses. Otherwise a
/// request from outside the focused server passes only when it uses
/// cross-server wording or names a server id.
pub fn guard(
    text: &str,
    guild_id: GuildId,
    focus: Option<&ServerFocus>,
    pending: Option<&PendingConfirmation>,
) -> Result<(), ContextRejection> {
    if let Some(p) = pending
        && !p.is_resolved()
        && p.guild_id != guild_id
    {
        return Err(ContextRejection::Interleaved {
            pending_guild: p.guild_id,
            pending_operation: p.operation.clone(),
        });
    }
    if let Some(focus) = focus
        && focus.guild_id != guild_id
        && !mentions_cross_server(text)
        && explicit_server_id(text).is_none()
    {
        return Err(ContextRejection::OtherServer {
            focus: focus.clone(),
        });
    }
    Ok(())
}

/// Principal -> current target server.
#[derive(Debug, Default)]
pub struct ConversationContexts {
    inner: Mutex<HashMap<UserId, ServerFocus>>,
}

impl ConversationContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self, principal: UserId) -> Option<ServerFocus> {
        self.inner.lock().await.get(&principal).cloned()
    }

    /// Set the focus on first interaction; an existing focus is kept.
    pub async fn establish(&self, principal: UserId, guild_id: GuildId, guild_name: &str) {
        self.inner
            .lock()
            .await
            .entry(principal)
            .or_insert_with(|| {
                tracing::debug!(principal, guild = guild_id, "Conversation focus established");
                ServerFocus {
                    guild_id,
                    guild_name: guild_name.to_string(),
                }
            });
    }

    /// Explicit switch after a cross-server operation.
    pub async fn switch(&self, principal: UserId, guild_id: GuildId, guild_name: String) {
        self.inner.lock().await.insert(
            principal,
            ServerFocus {
                guild_id,
                guild_name,
            },
        );
        tracing::info!(principal, guild = guild_id, "Conversation target server switched");
    }
}
