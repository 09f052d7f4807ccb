//! Human-readable notice text.

use std::time::Duration;

use serde_json::Value;

use crate::ops::{Arguments, arg_opt_str, arg_opt_u64};

use super::{Decision, DecisionSource, Verdict};

pub const CONFIRM_MARKER: &str = "✅";
pub const CANCEL_MARKER: &str = "❌";

/// One-line description of what `operation` will do.
pub fn describe(operation: &str, arguments: &Arguments) -> String {
    let text = |key: &str| arg_opt_str(arguments, key).unwrap_or("?").to_string();
    let number = |key: &str| match arg_opt_u64(arguments, key) {
        Ok(Some(n)) => n.to_string(),
        _ => "?".to_string(),
    };

    match operation {
        "delete_channel" => format!("Delete channel #{}", text("channel_name")),
        "delete_category_and_channels" => format!(
            "Delete category '{}' and every channel in it",
            text("category_name")
        ),
        "delete_role" => format!("Delete role @{}", text("role_name")),
        "kick_member" => with_reason(format!("Kick member {}", text("member")), arguments),
        "ban_member" => with_reason(format!("Ban member {}", text("member")), arguments),
        "timeout_member" => with_reason(
            format!(
                "Time out member {} for {} minutes",
                text("member"),
                number("minutes")
            ),
            arguments,
        ),
        "purge_messages" | "delete_message_bulk" => format!(
            "Delete the last {} messages in #{}",
            number("limit"),
            text("channel_name")
        ),
        "update_role_permissions" => format!(
            "Replace the permissions of @{} with: {}",
            text("role_name"),
            list(arguments, "permissions")
        ),
        "setup_word_filter" => format!(
            "Delete every message containing one of {} banned words",
            count(arguments, "words")
        ),
        "setup_anti_spam" => format!(
            "Limit members to {} messages per minute",
            number("max_messages_per_minute")
        ),
        "execute_cross_server_clone" => format!(
            "Copy this server's channels and roles to server {}",
            number("target_guild_id")
        ),
        "restore_server" => "Recreate channels and roles from a backup".to_string(),
        _ => generic(operation, arguments),
    }
}

fn with_reason(base: String, arguments: &Arguments) -> String {
    match arg_opt_str(arguments, "reason") {
        Some(reason) => format!("{base} (reason: {reason})"),
        None => base,
    }
}

fn list(arguments: &Arguments, key: &str) -> String {
    match arguments.get(key) {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => "nothing".to_string(),
    }
}

fn count(arguments: &Arguments, key: &str) -> usize {
    match arguments.get(key) {
        Some(Value::Array(items)) => items.len(),
        Some(Value::String(s)) => s.split(',').filter(|p| !p.trim().is_empty()).count(),
        _ => 0,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn generic(operation: &str, arguments: &Arguments) -> String {
    let params: Vec<String> = arguments
        .iter()
        .filter(|(k, _)| k.as_str() != "guild_id")
        .map(|(k, v)| format!("{k}={}", render_value(v)))
        .collect();
    if params.is_empty() {
        format!("Execute `{operation}`")
    } else {
        format!("Execute `{operation}` with parameters: {}", params.join(", "))
    }
}

/// Content of a freshly published notice.
pub fn render_notice(description: &str, timeout: Duration) -> String {
    format!(
        "⚠️ **Dangerous operation requested**\n{description}\n\n\
         React with {CONFIRM_MARKER} to confirm or {CANCEL_MARKER} to cancel, \
         or reply `yes` / `no`.\nExpires in {} seconds.",
        timeout.as_secs()
    )
}

/// Content of a notice after it has been resolved.
pub fn render_outcome(description: &str, decision: &Decision) -> String {
    let header = match (decision.verdict, decision.source) {
        (Verdict::Confirmed, _) => "✅ Confirmed",
        (Verdict::Denied, DecisionSource::Superseded) => "↪️ Superseded by a newer command",
        (Verdict::Denied, _) => "❌ Cancelled",
        (Verdict::TimedOut, _) => "⏰ Timed out",
    };
    format!("{header}\n{description}")
}

/// Verdict carried by a marker symbol.
pub fn marker_verdict(symbol: &str) -> Option<Verdict> {
    match symbol {
        CONFIRM_MARKER => Some(Verdict::Confirmed),
        CANCEL_MARKER => Some(Verdict::Denied),
        _ => None,
    }
}

/// Verdict carried by a reply, if it is exactly one answer token.
pub fn parse_reply(content: &str) -> Option<Verdict> {
    let token = content
        .trim()
        .trim_end_matches(['.', '!'])
        .to_lowercase();
    match token.as_str() {
        "confirm" | "yes" | "y" => Some(Verdict::Confirmed),
        "cancel" | "no" | "n" => Some(Verdict::Denied),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn templated_descriptions() {
        assert_eq!(
            describe("delete_channel", &args(json!({"channel_name": "general"}))),
            "Delete channel #general"
        );
        assert_eq!(
            describe(
                "ban_member",
                &args(json!({"member": "bob", "reason": "spam"}))
            ),
            "Ban member bob (reason: spam)"
        );
        assert_eq!(
            describe("purge_messages", &args(json!({"channel_name": "memes", "limit": "25"}))),
            "Delete the last 25 messages in #memes"
        );
        assert_eq!(
            describe("setup_word_filter", &args(json!({"words": ["a", "b", "c"]}))),
            "Delete every message containing one of 3 banned words"
        );
    }

    #[test]
    fn generic_description_skips_guild() {
        let text = describe(
            "create_invite_with_perms",
            &args(json!({"guild_id": 1, "channel_name": "lobby", "max_uses": 3})),
        );
        assert_eq!(
            text,
            "Execute `create_invite_with_perms` with parameters: channel_name=lobby, max_uses=3"
        );
        assert_eq!(describe("mystery", &Arguments::new()), "Execute `mystery`");
    }

    #[test]
    fn reply_tokens() {
        assert_eq!(parse_reply(" YES "), Some(Verdict::Confirmed));
        assert_eq!(parse_reply("y"), Some(Verdict::Confirmed));
        assert_eq!(parse_reply("confirm!"), Some(Verdict::Confirmed));
        assert_eq!(parse_reply("No."), Some(Verdict::Denied));
        assert_eq!(parse_reply("cancel"), Some(Verdict::Denied));
        assert_eq!(parse_reply("yes please"), None);
        assert_eq!(parse_reply("maybe"), None);
    }

    #[test]
    fn outcome_headers() {
        let text = render_outcome("Delete channel #x", &Decision::superseded());
        assert!(text.starts_with("↪️ Superseded"));
        let text = render_outcome("Delete channel #x", &Decision::timed_out());
        assert!(text.starts_with("⏰ Timed out"));
        assert!(text.ends_with("Delete channel #x"));
    }

    #[test]
    fn markers() {
        assert_eq!(marker_verdict("✅"), Some(Verdict::Confirmed));
        assert_eq!(marker_verdict("❌"), Some(Verdict::Denied));
        assert_eq!(marker_verdict("👍"), None);
    }
}
