//! Interactive sandbox against the in-memory platform.
//!
//! Lines typed at the prompt are sent as `/askai` prompts; `/deletecategory`
//! and `/createrole` go through the direct command path. Confirmation
//! notices are printed to the terminal and answered by typing `yes` or
//! `no` (or the ✅ / ❌ markers) on the next line.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{Mutex, mpsc};

use crate::commands::{CommandRouter, Origin, SlashCommand};
use crate::config::{DEFAULT_LEGACY_PREFIX, SandboxConfig};
use crate::confirm::{
    EventStream, MessageHandle, NotificationSurface, Principal, ReactionEvent, ReplyEvent,
};
use crate::dispatch::Dispatcher;
use crate::error::PlatformError;
use crate::llm::{LlmProvider, create_provider_chain};
use crate::platform::{MemoryPlatform, UserId};

const SANDBOX_BOT_ID: UserId = 1;
const DEFAULT_SANDBOX_USER: UserId = 900;

type Lines = Arc<Mutex<mpsc::Receiver<String>>>;

/// Terminal-backed notification surface.
///
/// Replies are read from the same stdin line feed as prompts; while a
/// confirmation is open the prompt loop is parked inside the dispatcher, so
/// the next line always reaches the confirmation.
pub struct ConsoleSurface {
    lines: Lines,
    user_id: UserId,
    next_id: AtomicU64,
}

impl ConsoleSurface {
    fn new(lines: Lines, user_id: UserId) -> Self {
        Self {
            lines,
            user_id,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl NotificationSurface for ConsoleSurface {
    fn surface_id(&self) -> String {
        "console".to_string()
    }

    async fn publish(&self, content: &str) -> Result<MessageHandle, PlatformError> {
        let handle = MessageHandle(format!(
            "console-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        println!("\n\x1b[33m{content}\x1b[0m");
        Ok(handle)
    }

    async fn edit(&self, _handle: &MessageHandle, content: &str) -> Result<(), PlatformError> {
        println!("\x1b[90m{content}\x1b[0m\n");
        Ok(())
    }

    async fn add_markers(
        &self,
        _handle: &MessageHandle,
        markers: &[&str],
    ) -> Result<(), PlatformError> {
        println!("\x1b[90m(type yes/no or {})\x1b[0m", markers.join(" / "));
        prompt_marker();
        Ok(())
    }

    async fn reactions(
        &self,
        _handle: &MessageHandle,
    ) -> Result<EventStream<ReactionEvent>, PlatformError> {
        Ok(futures::stream::pending().boxed())
    }

    async fn replies(
        &self,
        _handle: &MessageHandle,
    ) -> Result<EventStream<ReplyEvent>, PlatformError> {
        let user_id = self.user_id;
        let stream = futures::stream::unfold(Arc::clone(&self.lines), move |lines| async move {
            let content = lines.lock().await.recv().await?;
            Some((
                ReplyEvent {
                    user_id,
                    is_bot: false,
                    content,
                },
                lines,
            ))
        });
        Ok(stream.boxed())
    }
}

/// Sandbox session settings.
#[derive(Debug, Clone)]
pub struct SandboxOptions {
    pub user: Option<UserId>,
    pub admin: bool,
    pub offline: bool,
}

fn prompt_marker() {
    print!("\x1b[1;36m> \x1b[0m");
    let _ = std::io::stdout().flush();
}

fn spawn_stdin_reader() -> Lines {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    Arc::new(Mutex::new(rx))
}

fn parse_sandbox_line(line: &str) -> SlashCommand {
    if let Some(rest) = line.strip_prefix("/deletecategory") {
        return SlashCommand::DeleteCategory {
            name: rest.trim().to_string(),
        };
    }
    if let Some(rest) = line.strip_prefix("/createrole") {
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_string();
        return SlashCommand::CreateRole {
            name,
            color: parts.next().map(str::to_string),
            permissions: parts.next().map(str::to_string),
        };
    }
    let prompt = line.strip_prefix("/askai").unwrap_or(line).trim();
    SlashCommand::AskAi {
        prompt: prompt.to_string(),
    }
}

/// Run the sandbox until stdin closes or `/quit` is typed.
pub async fn run_sandbox(options: SandboxOptions) -> anyhow::Result<()> {
    let config = SandboxConfig::from_env()?;

    let llm: Option<Arc<dyn LlmProvider>> =
        if options.offline || config.llm.providers.is_empty() {
            None
        } else {
            Some(create_provider_chain(&config.llm)?)
        };

    let owner_id = crate::config::resolve_owner_id().unwrap_or(DEFAULT_SANDBOX_USER);
    let user_id = options.user.unwrap_or(owner_id);

    let platform = Arc::new(MemoryPlatform::demo());
    let guild_id = platform.demo_guild_id();
    let mirror_id = platform.mirror_guild_id();

    let dispatcher = Dispatcher::new(
        platform,
        llm.clone(),
        owner_id,
        SANDBOX_BOT_ID,
        config.dispatch.clone(),
    )?;
    let router = CommandRouter::new(Arc::new(dispatcher), owner_id, DEFAULT_LEGACY_PREFIX);

    let mut principal = Principal::new(user_id, "sandbox");
    if options.admin {
        principal = principal.administrator();
    }
    let origin = Origin {
        principal,
        guild_id,
        guild_name: "Warden Demo".to_string(),
    };

    let lines = spawn_stdin_reader();
    let surface: Arc<dyn NotificationSurface> =
        Arc::new(ConsoleSurface::new(Arc::clone(&lines), user_id));

    println!("\x1b[1mWarden sandbox\x1b[0m");
    println!("  server {guild_id} (\"Warden Demo\"), mirror server {mirror_id}");
    println!(
        "  acting as user {user_id}{}, owner {owner_id}",
        if options.admin { " (administrator)" } else { "" }
    );
    println!(
        "  model: {}",
        llm.as_ref()
            .map(|l| l.model_name().to_string())
            .unwrap_or_else(|| "none (pattern matching only)".to_string())
    );
    println!("  /quit to exit\n");

    loop {
        prompt_marker();
        let Some(line) = lines.lock().await.recv().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "/quit" | "/exit") {
            break;
        }

        let command = parse_sandbox_line(line);
        for chunk in router.on_slash(command, &origin, Arc::clone(&surface)).await {
            println!("{chunk}\n");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_lines_map_to_commands() {
        assert_eq!(
            parse_sandbox_line("/deletecategory Old Stuff"),
            SlashCommand::DeleteCategory {
                name: "Old Stuff".into()
            }
        );
        assert_eq!(
            parse_sandbox_line("/createrole VIP #ff0000"),
            SlashCommand::CreateRole {
                name: "VIP".into(),
                color: Some("#ff0000".into()),
                permissions: None,
            }
        );
        assert_eq!(
            parse_sandbox_line("list roles"),
            SlashCommand::AskAi {
                prompt: "list roles".into()
            }
        );
    }

    #[tokio::test]
    async fn console_replies_come_from_the_line_feed() {
        let (tx, rx) = mpsc::channel(4);
        let surface = ConsoleSurface::new(Arc::new(Mutex::new(rx)), 42);
        tx.send("yes".to_string()).await.unwrap();
        let handle = MessageHandle("console-1".into());
        let mut replies = surface.replies(&handle).await.unwrap();
        let event = replies.next().await.unwrap();
        assert_eq!(event.user_id, 42);
        assert_eq!(event.content, "yes");
    }
}
