//! Intent resolver.
//!
//! Turns free text into at most one [`ResolvedInvocation`]. Used when the
//! remote model answers without a tool call, or when every provider failed.
//! Help requests short-circuit to canned text before any matcher runs.
//!
//! ```text
//!   text ──► help? ──yes──► Resolution::Help(topic)
//!              │
//!              no
//!              ▼
//!   create_multiple ─► create_single ─► list ─► delete ─► stats ─► backup
//!        first matcher returning Some wins; all None ─► Resolution::None
//! ```

mod extract;
mod help;

pub use help::HelpTopic;

use serde::Serialize;
use serde_json::Value;

use crate::llm::ToolCall;
use crate::ops::{Arguments, OperationRegistry};
use crate::platform::GuildId;

use extract::{MATCHERS, Prompt};

/// Where an invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Structured tool call produced by the remote model.
    ExplicitToolCall,
    /// Produced by a text matcher.
    PatternMatched,
    /// Built by a direct admin command.
    Direct,
}

/// An operation name plus arguments, ready for the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedInvocation {
    pub operation: String,
    pub arguments: Arguments,
    pub confidence: Confidence,
}

impl ResolvedInvocation {
    pub fn pattern(operation: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            operation: operation.into(),
            arguments,
            confidence: Confidence::PatternMatched,
        }
    }

    pub fn direct(operation: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            operation: operation.into(),
            arguments,
            confidence: Confidence::Direct,
        }
    }

    /// Invocation from a model tool call. Non-object arguments become empty.
    pub fn from_tool_call(call: &ToolCall) -> Self {
        Self {
            operation: call.name.clone(),
            arguments: call.arguments.as_object().cloned().unwrap_or_default(),
            confidence: Confidence::ExplicitToolCall,
        }
    }
}

/// Multi-item operations synthesized by the resolver. They are expanded
/// into one underlying catalog call per name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoOperation {
    CreateMultipleChannels,
    CreateMultipleRoles,
}

impl PseudoOperation {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "create_multiple_channels" => Some(Self::CreateMultipleChannels),
            "create_multiple_roles" => Some(Self::CreateMultipleRoles),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CreateMultipleChannels => "create_multiple_channels",
            Self::CreateMultipleRoles => "create_multiple_roles",
        }
    }

    /// Catalog operation executed once per name.
    pub fn underlying(self) -> &'static str {
        match self {
            Self::CreateMultipleChannels => "create_channel",
            Self::CreateMultipleRoles => "create_role",
        }
    }

    /// Arguments for the underlying call that creates `name`.
    pub fn item_arguments(self, base: &Arguments, name: &str) -> Arguments {
        let mut args: Arguments = base
            .iter()
            .filter(|(k, _)| k.as_str() != "names")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let key = match self {
            Self::CreateMultipleChannels => "name",
            Self::CreateMultipleRoles => "role_name",
        };
        args.insert(key.into(), Value::from(name));
        args
    }
}

/// Outcome of resolving one prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Help(HelpTopic),
    Invocation(ResolvedInvocation),
    None,
}

/// Ordered matcher chain over a prompt.
pub struct IntentResolver<'r> {
    registry: &'r OperationRegistry,
}

impl<'r> IntentResolver<'r> {
    pub fn new(registry: &'r OperationRegistry) -> Self {
        Self { registry }
    }

    /// Full resolution including help detection.
    pub fn resolve(&self, text: &str, guild_id: GuildId) -> Resolution {
        let prompt = Prompt::new(text, guild_id);
        if let Some(topic) = help::detect(&prompt) {
            tracing::debug!(?topic, "Help request detected");
            return Resolution::Help(topic);
        }
        match self.match_prompt(&prompt) {
            Some(invocation) => Resolution::Invocation(invocation),
            None => Resolution::None,
        }
    }

    /// Operation matching only; help keywords are not considered.
    pub fn resolve_invocation(&self, text: &str, guild_id: GuildId) -> Option<ResolvedInvocation> {
        self.match_prompt(&Prompt::new(text, guild_id))
    }

    /// Canned help for `text`, if it is a help request.
    pub fn help_topic(&self, text: &str) -> Option<HelpTopic> {
        help::detect(&Prompt::new(text, 0))
    }

    fn match_prompt(&self, prompt: &Prompt<'_>) -> Option<ResolvedInvocation> {
        for (label, matcher) in MATCHERS {
            let Some(invocation) = matcher(prompt) else {
                continue;
            };
            if !self.is_known(&invocation.operation) {
                tracing::warn!(
                    matcher = label,
                    operation = %invocation.operation,
                    "Matcher produced an operation missing from the registry"
                );
                continue;
            }
            tracing::debug!(
                matcher = label,
                operation = %invocation.operation,
                "Resolved intent from text"
            );
            return Some(invocation);
        }
        None
    }

    fn is_known(&self, operation: &str) -> bool {
        match PseudoOperation::parse(operation) {
            Some(pseudo) => self.registry.contains(pseudo.underlying()),
            None => self.registry.contains(operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const GUILD: GuildId = 1_234_567_890_123_456;

    fn resolve(text: &str) -> Option<ResolvedInvocation> {
        let registry = OperationRegistry::builtin();
        IntentResolver::new(&registry).resolve_invocation(text, GUILD)
    }

    #[test]
    fn multi_channel_creation() {
        let inv = resolve("create channels called alpha, beta, gamma").unwrap();
        assert_eq!(inv.operation, "create_multiple_channels");
        assert_eq!(inv.arguments["names"], json!(["alpha", "beta", "gamma"]));
        assert_eq!(inv.arguments["channel_type"], "text");
        assert_eq!(inv.arguments["guild_id"], GUILD);
        assert_eq!(inv.confidence, Confidence::PatternMatched);
    }

    #[test]
    fn single_role_with_hex_color() {
        let inv = resolve("create role called VIP with color #112233").unwrap();
        assert_eq!(inv.operation, "create_role");
        assert_eq!(inv.arguments["role_name"], "VIP");
        assert_eq!(inv.arguments["color"], "#112233");
    }

    #[test]
    fn no_verb_entity_pair_is_none() {
        assert!(resolve("what a lovely day it is").is_none());
        assert!(resolve("create something nice").is_none());
        assert!(resolve("channels are great").is_none());
    }

    #[test]
    fn multi_roles_carry_color() {
        let inv = resolve("make roles Red Team and Blue Team with color blue").unwrap();
        assert_eq!(inv.operation, "create_multiple_roles");
        assert_eq!(inv.arguments["color"], "#0000FF");
    }

    #[test]
    fn voice_channel_single() {
        let inv = resolve("make a voice channel called Gaming").unwrap();
        assert_eq!(inv.operation, "create_channel");
        assert_eq!(inv.arguments["name"], "Gaming");
        assert_eq!(inv.arguments["channel_type"], "voice");
    }

    #[test]
    fn creation_beats_deletion() {
        let inv = resolve("create channel fresh then delete channel stale").unwrap();
        assert_eq!(inv.operation, "create_channel");
        assert_eq!(inv.arguments["name"], "fresh");
    }

    #[test]
    fn multi_without_names_falls_through_to_next_category() {
        let inv = resolve("list channels, please").unwrap();
        assert_eq!(inv.operation, "list_channels");
    }

    #[test]
    fn stats_and_backup() {
        assert_eq!(resolve("show server info").unwrap().operation, "get_server_stats");
        assert_eq!(resolve("backup this server").unwrap().operation, "backup_server");
    }

    #[test]
    fn help_short_circuits() {
        let registry = OperationRegistry::builtin();
        let resolver = IntentResolver::new(&registry);
        assert_eq!(
            resolver.resolve("how do i create channel general", GUILD),
            Resolution::Help(HelpTopic::General)
        );
        assert!(matches!(
            resolver.resolve("create channel general", GUILD),
            Resolution::Invocation(_)
        ));
    }

    #[test]
    fn pseudo_item_arguments_replace_names() {
        let mut base = Arguments::new();
        base.insert("guild_id".into(), json!(GUILD));
        base.insert("names".into(), json!(["a", "b"]));
        base.insert("color".into(), json!("#FF0000"));

        let args = PseudoOperation::CreateMultipleRoles.item_arguments(&base, "a");
        assert_eq!(args["role_name"], "a");
        assert_eq!(args["color"], "#FF0000");
        assert!(!args.contains_key("names"));
    }

    #[test]
    fn tool_call_with_non_object_arguments() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "list_roles".into(),
            arguments: json!("oops"),
        };
        let inv = ResolvedInvocation::from_tool_call(&call);
        assert!(inv.arguments.is_empty());
        assert_eq!(inv.confidence, Confidence::ExplicitToolCall);
    }
}
