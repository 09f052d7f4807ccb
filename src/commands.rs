//! User-facing command surface.
//!
//! - `/askai <prompt>`: anyone
//! - `¬askai <prompt>` (configurable prefix): bot owner only
//! - `/deletecategory <name>`, `/createrole <name> [color] [permissions]`:
//!   owner or administrator, skip the model and the resolver
//!
//! Replies longer than one chat message are split by [`chunk_response`].

use std::sync::Arc;

use serde_json::{Value, json};

use crate::confirm::{NotificationSurface, Principal};
use crate::dispatch::{Dispatcher, Request};
use crate::intent::ResolvedInvocation;
use crate::ops::Arguments;
use crate::platform::{GuildId, UserId};

/// Hard message length limit of the chat platform.
pub const MESSAGE_LIMIT: usize = 2000;

/// Size of each piece when a reply has to be split.
pub const CHUNK_SIZE: usize = 1900;

pub const CONTINUATION_PREFIX: &str = "(continued...)\n";

/// A structured slash command as delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    AskAi {
        prompt: String,
    },
    DeleteCategory {
        name: String,
    },
    CreateRole {
        name: String,
        color: Option<String>,
        /// Comma-separated permission names.
        permissions: Option<String>,
    },
}

/// Where a command was issued.
#[derive(Debug, Clone)]
pub struct Origin {
    pub principal: Principal,
    pub guild_id: GuildId,
    pub guild_name: String,
}

impl Origin {
    fn request(&self, text: impl Into<String>) -> Request {
        Request::new(
            self.principal.clone(),
            self.guild_id,
            self.guild_name.clone(),
            text,
        )
    }
}

/// Prompt after the legacy prefix, if `content` starts with it.
pub fn parse_legacy<'a>(prefix: &str, content: &'a str) -> Option<&'a str> {
    content.trim_start().strip_prefix(prefix).map(str::trim)
}

/// Routes commands into the dispatcher and applies per-command access rules.
pub struct CommandRouter {
    dispatcher: Arc<Dispatcher>,
    owner_id: UserId,
    legacy_prefix: String,
}

impl CommandRouter {
    pub fn new(dispatcher: Arc<Dispatcher>, owner_id: UserId, legacy_prefix: impl Into<String>) -> Self {
        Self {
            dispatcher,
            owner_id,
            legacy_prefix: legacy_prefix.into(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn is_owner_or_admin(&self, principal: &Principal) -> bool {
        principal.user_id == self.owner_id || principal.is_administrator
    }

    /// Handle a slash command. Returns the reply split into messages.
    pub async fn on_slash(
        &self,
        command: SlashCommand,
        origin: &Origin,
        surface: Arc<dyn NotificationSurface>,
    ) -> Vec<String> {
        tracing::info!(
            user = origin.principal.user_id,
            guild = origin.guild_id,
            command = ?command,
            "Slash command"
        );
        let reply = match command {
            SlashCommand::AskAi { prompt } => {
                if prompt.trim().is_empty() {
                    "Usage: `/askai <what you want done>`. Try `/askai help`.".to_string()
                } else {
                    self.dispatcher
                        .handle(&origin.request(prompt), surface, None)
                        .await
                }
            }
            SlashCommand::DeleteCategory { name } => {
                if !self.is_owner_or_admin(&origin.principal) {
                    return vec![ADMIN_ONLY.to_string()];
                }
                let mut args = Arguments::new();
                args.insert("category_name".into(), Value::from(name.trim()));
                self.dispatcher
                    .run_direct(
                        &origin.request("/deletecategory"),
                        ResolvedInvocation::direct("delete_category_and_channels", args),
                        surface,
                    )
                    .await
            }
            SlashCommand::CreateRole {
                name,
                color,
                permissions,
            } => {
                if !self.is_owner_or_admin(&origin.principal) {
                    return vec![ADMIN_ONLY.to_string()];
                }
                let mut args = Arguments::new();
                args.insert("role_name".into(), Value::from(name.trim()));
                if let Some(color) = color.filter(|c| !c.trim().is_empty()) {
                    args.insert("color".into(), Value::from(color.trim()));
                }
                if let Some(permissions) = permissions {
                    let list: Vec<&str> = permissions
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .collect();
                    if !list.is_empty() {
                        args.insert("permissions".into(), json!(list));
                    }
                }
                self.dispatcher
                    .run_direct(
                        &origin.request("/createrole"),
                        ResolvedInvocation::direct("create_role", args),
                        surface,
                    )
                    .await
            }
        };
        chunk_response(&reply)
    }

    /// Handle a plain chat message.
    ///
    /// Returns `None` when the message is not addressed to the bot.
    pub async fn on_message(
        &self,
        origin: &Origin,
        is_bot: bool,
        content: &str,
        surface: Arc<dyn NotificationSurface>,
    ) -> Option<Vec<String>> {
        if is_bot {
            return None;
        }
        let prompt = parse_legacy(&self.legacy_prefix, content)?;
        if origin.principal.user_id != self.owner_id {
            tracing::info!(
                user = origin.principal.user_id,
                "Legacy prefix used by non-owner"
            );
            return Some(vec![format!(
                "🚫 `{}` is reserved for the bot owner. Use `/askai` instead.",
                self.legacy_prefix
            )]);
        }
        if prompt.is_empty() {
            return Some(vec![format!("Usage: `{} <prompt>`", self.legacy_prefix)]);
        }
        let reply = self
            .dispatcher
            .handle(&origin.request(prompt), surface, None)
            .await;
        Some(chunk_response(&reply))
    }
}

const ADMIN_ONLY: &str = "🚫 You need administrator permission to use this command.";

/// Split `text` into chat-sized messages.
///
/// Text within [`MESSAGE_LIMIT`] characters is returned as is. Longer text
/// is cut into pieces of at most [`CHUNK_SIZE`] characters, on line
/// boundaries where possible; every piece after the first is prefixed
/// with [`CONTINUATION_PREFIX`].
pub fn chunk_response(text: &str) -> Vec<String> {
    if text.chars().count() <= MESSAGE_LIMIT {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let mut rest = line;
        while !rest.is_empty() {
            let len = rest.chars().count();
            if current_len + len <= CHUNK_SIZE {
                current.push_str(rest);
                current_len += len;
                break;
            }
            if current_len > 0 {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            // A single line longer than a chunk: cut at a char boundary.
            let cut = rest
                .char_indices()
                .nth(CHUNK_SIZE)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            pieces.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            let piece = piece.trim_end_matches('\n');
            if i == 0 {
                piece.to_string()
            } else {
                format!("{CONTINUATION_PREFIX}{piece}")
            }
        })
        .collect()
}
