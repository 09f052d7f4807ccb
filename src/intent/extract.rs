//! Pure text matchers for the intent resolver.
//!
//! Each matcher takes a tokenized [`Prompt`] and returns at most one
//! invocation. Matchers never look at each other's results; ordering is
//! decided by [`MATCHERS`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::ops::Arguments;
use crate::platform::GuildId;

use super::{PseudoOperation, ResolvedInvocation};

/// Compile a built-in pattern. A pattern that fails to compile disables
/// only the matcher step that uses it.
fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| tracing::error!(pattern, error = %e, "Invalid intent pattern"))
        .ok()
}

static CALLED_NAMED_LIST: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)\b(?:called|named)\s+(.+)"));

static CALLED_NAMED_ONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)\b(?:called|named)\s+([^\s,]+)"));

static TWO_NAMES: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r"(?i)\b(?:channels?|roles?)\s+([a-zA-Z0-9_-]+)\s+and\s+([a-zA-Z0-9_-]+)")
});

static QUOTED: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r#""([^"]+)"|“([^”]+)”|`([^`]+)`|(?:^|\s)'([^']+)'"#));

static HEX_COLOR: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"#[0-9A-Fa-f]{6}\b"));

static COLOR_CLAUSE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r"(?i)\bcolou?r\s*(?:of\s+|is\s+|[:=]\s*)?(#[0-9A-Fa-f]{6}\b|[a-z]+)")
});

static TRAILING_CLAUSE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)\s+with\s+"));

static AND_SEPARATOR: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)\s+and\s+"));

const CREATE_VERBS: &[&str] = &["create", "make"];
const LIST_VERBS: &[&str] = &["list", "show", "get", "display"];
const DELETE_VERBS: &[&str] = &["delete", "remove"];

const NAMED_COLORS: &[(&str, &str)] = &[
    ("red", "#FF0000"),
    ("blue", "#0000FF"),
    ("green", "#00FF00"),
    ("yellow", "#FFFF00"),
    ("purple", "#800080"),
    ("orange", "#FFA500"),
    ("pink", "#FFC0CB"),
];

/// Words that can never be an extracted name.
const STOP_WORDS: &[&str] = &[
    "channel",
    "channels",
    "role",
    "roles",
    "category",
    "categories",
    "called",
    "named",
    "one",
    "multiple",
    "text",
    "voice",
    "a",
    "an",
    "the",
    "new",
    "some",
    "and",
    "for",
    "me",
    "please",
    "two",
    "three",
    "four",
    "five",
];

/// Kind of entity a request talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Noun {
    Channel,
    Category,
    Role,
}

impl Noun {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "channel" | "channels" => Some(Self::Channel),
            "category" | "categories" => Some(Self::Category),
            "role" | "roles" => Some(Self::Role),
            _ => None,
        }
    }
}

/// A prompt split into tokens once, shared by every matcher.
pub(crate) struct Prompt<'a> {
    pub raw: &'a str,
    pub lower: String,
    /// Tokens in original case with surrounding punctuation removed.
    pub tokens: Vec<&'a str>,
    /// Lowercased copies of `tokens`.
    pub words: Vec<String>,
    pub guild_id: GuildId,
}

impl<'a> Prompt<'a> {
    pub fn new(raw: &'a str, guild_id: GuildId) -> Self {
        let tokens: Vec<&str> = raw
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| ",.!?;:()\"'`“”".contains(c)))
            .filter(|t| !t.is_empty())
            .collect();
        let words = tokens.iter().map(|t| t.to_lowercase()).collect();
        Self {
            raw,
            lower: raw.to_lowercase(),
            tokens,
            words,
            guild_id,
        }
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    pub fn has_any_word(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.has_word(w))
    }

    /// Consecutive whole words, e.g. `"how to"`.
    pub fn has_phrase(&self, phrase: &str) -> bool {
        let parts: Vec<&str> = phrase.split_whitespace().collect();
        !parts.is_empty()
            && self
                .words
                .windows(parts.len())
                .any(|window| window.iter().zip(&parts).all(|(w, p)| w == p))
    }

    /// Index of the first token that is one of `words`.
    fn position_of_any(&self, words: &[&str]) -> Option<usize> {
        self.words.iter().position(|w| words.contains(&w.as_str()))
    }

    /// First entity noun after `start`, with its index.
    fn noun_after(&self, start: usize) -> Option<(Noun, usize)> {
        self.words
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(i, w)| Noun::parse(w).map(|n| (n, i)))
    }

    fn base_arguments(&self) -> Arguments {
        let mut args = Arguments::new();
        args.insert("guild_id".into(), Value::from(self.guild_id));
        args
    }
}

/// A pure `prompt -> invocation` rule.
pub(crate) type Matcher = fn(&Prompt<'_>) -> Option<ResolvedInvocation>;

/// Matchers in priority order: creation, listing, deletion, then
/// statistics and backup. The first one that produces an invocation wins.
pub(crate) const MATCHERS: &[(&str, Matcher)] = &[
    ("create_multiple", match_create_multiple),
    ("create_single", match_create_single),
    ("list", match_list),
    ("delete", match_delete),
    ("stats", match_stats),
    ("backup", match_backup),
];

/// Request uses plural or multi-item phrasing.
pub(crate) fn is_multi_item(prompt: &Prompt<'_>) -> bool {
    prompt.has_word("multiple") || prompt.raw.contains(',') || prompt.lower.contains(" and ")
}

/// Create verb followed by a channel, category or role noun.
fn creation_target(prompt: &Prompt<'_>) -> Option<(usize, Noun)> {
    let verb = prompt.position_of_any(CREATE_VERBS)?;
    let (noun, _) = prompt.noun_after(verb + 1)?;
    Some((verb, noun))
}

pub(crate) fn match_create_multiple(prompt: &Prompt<'_>) -> Option<ResolvedInvocation> {
    if !is_multi_item(prompt) {
        return None;
    }
    let (verb, noun) = creation_target(prompt)?;
    let names = extract_names(prompt, verb);
    if names.is_empty() {
        return None;
    }

    let mut args = prompt.base_arguments();
    args.insert("names".into(), json!(names));
    let pseudo = match noun {
        Noun::Role => {
            if let Some(color) = extract_color(prompt, &names) {
                args.insert("color".into(), Value::from(color));
            }
            PseudoOperation::CreateMultipleRoles
        }
        Noun::Channel | Noun::Category => {
            args.insert("channel_type".into(), Value::from(channel_type(prompt)));
            PseudoOperation::CreateMultipleChannels
        }
    };
    Some(ResolvedInvocation::pattern(pseudo.name(), args))
}

pub(crate) fn match_create_single(prompt: &Prompt<'_>) -> Option<ResolvedInvocation> {
    let (verb, noun) = creation_target(prompt)?;
    let name = extract_single_name(prompt, verb)?;

    let mut args = prompt.base_arguments();
    match noun {
        Noun::Role => {
            if let Some(color) = extract_color(prompt, std::slice::from_ref(&name)) {
                args.insert("color".into(), Value::from(color));
            }
            args.insert("role_name".into(), Value::from(name));
            Some(ResolvedInvocation::pattern("create_role", args))
        }
        Noun::Channel | Noun::Category => {
            args.insert("name".into(), Value::from(name));
            args.insert("channel_type".into(), Value::from(channel_type(prompt)));
            Some(ResolvedInvocation::pattern("create_channel", args))
        }
    }
}

pub(crate) fn match_list(prompt: &Prompt<'_>) -> Option<ResolvedInvocation> {
    let verb = prompt.position_of_any(LIST_VERBS)?;
    let operation = match prompt.noun_after(verb + 1)?.0 {
        Noun::Channel | Noun::Category => "list_channels",
        Noun::Role => "list_roles",
    };
    Some(ResolvedInvocation::pattern(operation, prompt.base_arguments()))
}

pub(crate) fn match_delete(prompt: &Prompt<'_>) -> Option<ResolvedInvocation> {
    let verb = prompt.position_of_any(DELETE_VERBS)?;
    let (noun, noun_idx) = prompt.noun_after(verb + 1)?;
    let target = quoted_name(prompt)
        .or_else(|| called_named(prompt))
        .or_else(|| token_after(prompt, noun_idx))?;

    let (operation, key) = match noun {
        Noun::Channel => ("delete_channel", "channel_name"),
        Noun::Category => ("delete_category_and_channels", "category_name"),
        Noun::Role => ("delete_role", "role_name"),
    };
    let mut args = prompt.base_arguments();
    args.insert(key.into(), Value::from(target));
    Some(ResolvedInvocation::pattern(operation, args))
}

pub(crate) fn match_stats(prompt: &Prompt<'_>) -> Option<ResolvedInvocation> {
    let wants_stats = prompt.has_any_word(&["stats", "statistics"])
        || prompt.lower.contains("server info")
        || prompt.lower.contains("server status");
    wants_stats.then(|| ResolvedInvocation::pattern("get_server_stats", prompt.base_arguments()))
}

pub(crate) fn match_backup(prompt: &Prompt<'_>) -> Option<ResolvedInvocation> {
    (prompt.has_word("backup") && prompt.has_word("server"))
        .then(|| ResolvedInvocation::pattern("backup_server", prompt.base_arguments()))
}

/// Names for a multi-item request, in order of preference: the list after
/// "called"/"named", exactly two names joined by "and", then every
/// non-stop-word token after the verb.
pub(crate) fn extract_names(prompt: &Prompt<'_>, verb: usize) -> Vec<String> {
    if let Some(caps) = CALLED_NAMED_LIST
        .as_ref()
        .and_then(|re| re.captures(prompt.raw))
    {
        let mut list = caps.get(1).map_or("", |m| m.as_str());
        if let Some(clause) = TRAILING_CLAUSE.as_ref().and_then(|re| re.find(list)) {
            list = &list[..clause.start()];
        }
        let names = match AND_SEPARATOR.as_ref() {
            Some(re) => split_names(&re.replace_all(list, ",")),
            None => split_names(list),
        };
        if !names.is_empty() {
            return names;
        }
    }

    if let Some(caps) = TWO_NAMES.as_ref().and_then(|re| re.captures(prompt.raw)) {
        let names: Vec<String> = [caps.get(1), caps.get(2)]
            .into_iter()
            .flatten()
            .filter_map(|m| clean_name(m.as_str()))
            .collect();
        if names.len() == 2 {
            return names;
        }
    }

    prompt
        .tokens
        .iter()
        .zip(&prompt.words)
        .skip(verb + 1)
        .take_while(|(_, w)| w.as_str() != "with")
        .filter(|(t, w)| is_name_token(t, w))
        .map(|(t, _)| t.to_string())
        .collect()
}

/// Single name: quoted text, then the token after "called"/"named", then
/// the first non-stop-word token after the verb.
pub(crate) fn extract_single_name(prompt: &Prompt<'_>, verb: usize) -> Option<String> {
    quoted_name(prompt)
        .or_else(|| called_named(prompt))
        .or_else(|| token_after(prompt, verb))
}

fn quoted_name(prompt: &Prompt<'_>) -> Option<String> {
    let caps = QUOTED.as_ref()?.captures(prompt.raw)?;
    (1..=4)
        .filter_map(|i| caps.get(i))
        .find_map(|m| clean_name(m.as_str()))
}

fn called_named(prompt: &Prompt<'_>) -> Option<String> {
    let caps = CALLED_NAMED_ONE.as_ref()?.captures(prompt.raw)?;
    clean_name(caps.get(1)?.as_str())
}

/// First name-like token after index `idx`, stopping at "with".
fn token_after(prompt: &Prompt<'_>, idx: usize) -> Option<String> {
    prompt
        .tokens
        .iter()
        .zip(&prompt.words)
        .skip(idx + 1)
        .take_while(|(_, w)| w.as_str() != "with")
        .find(|(t, w)| is_name_token(t, w))
        .map(|(t, _)| t.to_string())
}

fn is_name_token(token: &str, lower: &str) -> bool {
    !STOP_WORDS.contains(&lower)
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',').filter_map(clean_name).collect()
}

fn clean_name(raw: &str) -> Option<String> {
    let name = raw
        .trim()
        .trim_matches(|c: char| "\"'`“”.!?".contains(c))
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// "voice" or "category" anywhere wins; otherwise text.
pub(crate) fn channel_type(prompt: &Prompt<'_>) -> &'static str {
    if prompt.has_word("voice") {
        "voice"
    } else if prompt.has_any_word(&["category", "categories"]) {
        "category"
    } else {
        "text"
    }
}

/// Color for a role request: the "color X" clause (hex or named), then a
/// hex code anywhere, then a named color word that is not part of one of
/// `names`.
pub(crate) fn extract_color(prompt: &Prompt<'_>, names: &[String]) -> Option<String> {
    if let Some(value) = COLOR_CLAUSE
        .as_ref()
        .and_then(|re| re.captures(prompt.raw))
        .and_then(|caps| caps.get(1))
    {
        let value = value.as_str();
        if value.starts_with('#') {
            return Some(value.to_string());
        }
        if let Some(hex) = named_color(&value.to_lowercase()) {
            return Some(hex.to_string());
        }
    }
    if let Some(m) = HEX_COLOR.as_ref().and_then(|re| re.find(prompt.raw)) {
        return Some(m.as_str().to_string());
    }
    let name_words: Vec<String> = names
        .iter()
        .flat_map(|n| n.split_whitespace())
        .map(str::to_lowercase)
        .collect();
    prompt
        .words
        .iter()
        .filter(|w| !name_words.contains(*w))
        .find_map(|w| named_color(w))
        .map(str::to_string)
}

fn named_color(word: &str) -> Option<&'static str> {
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, hex)| *hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = 42;

    fn names(text: &str) -> Vec<String> {
        let prompt = Prompt::new(text, GUILD);
        let verb = prompt.position_of_any(CREATE_VERBS).unwrap();
        extract_names(&prompt, verb)
    }

    #[test]
    fn names_after_called_split_on_commas_and_and() {
        assert_eq!(
            names("create channels called alpha, beta and gamma"),
            vec!["alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn names_after_called_stop_at_with_clause() {
        assert_eq!(
            names("create roles named Red Team, Blue Team with color #112233"),
            vec!["Red Team", "Blue Team"]
        );
    }

    #[test]
    fn two_names_joined_by_and() {
        assert_eq!(names("create channels dev and ops"), vec!["dev", "ops"]);
    }

    #[test]
    fn token_scan_skips_stop_words() {
        assert_eq!(
            names("make multiple voice channels lobby, stage"),
            vec!["lobby", "stage"]
        );
    }

    #[test]
    fn quoted_name_beats_called() {
        let prompt = Prompt::new(r#"create a channel "war room" called ignored"#, GUILD);
        assert_eq!(extract_single_name(&prompt, 0).as_deref(), Some("war room"));
    }

    #[test]
    fn apostrophes_are_not_quotes() {
        let prompt = Prompt::new("let's create channel lounge", GUILD);
        let verb = prompt.position_of_any(CREATE_VERBS).unwrap();
        assert_eq!(extract_single_name(&prompt, verb).as_deref(), Some("lounge"));
    }

    #[test]
    fn hex_color_beats_named_color() {
        let prompt = Prompt::new("create a red role called X with color #abcdef", GUILD);
        assert_eq!(extract_color(&prompt, &[]).as_deref(), Some("#abcdef"));

        let prompt = Prompt::new("create a purple role called X", GUILD);
        assert_eq!(extract_color(&prompt, &["X".into()]).as_deref(), Some("#800080"));
    }

    #[test]
    fn color_clause_beats_color_words_in_names() {
        let prompt = Prompt::new("make roles Red Team and Blue Team with color blue", GUILD);
        let names = vec!["Red Team".to_string(), "Blue Team".to_string()];
        assert_eq!(extract_color(&prompt, &names).as_deref(), Some("#0000FF"));

        let prompt = Prompt::new("create role Red Team with colour: green", GUILD);
        assert_eq!(extract_color(&prompt, &[]).as_deref(), Some("#00FF00"));
    }

    #[test]
    fn color_words_inside_names_are_skipped() {
        let prompt = Prompt::new("create roles called Red Team, Blue Team", GUILD);
        let names = vec!["Red Team".to_string(), "Blue Team".to_string()];
        assert_eq!(extract_color(&prompt, &names), None);
    }

    #[test]
    fn phrases_match_whole_words() {
        let prompt = Prompt::new("show today's channels, how to?", GUILD);
        assert!(prompt.has_phrase("how to"));
        let prompt = Prompt::new("show today's channels", GUILD);
        assert!(!prompt.has_phrase("how to"));
    }

    #[test]
    fn channel_type_inference() {
        assert_eq!(channel_type(&Prompt::new("create voice channel x", GUILD)), "voice");
        assert_eq!(channel_type(&Prompt::new("create category x", GUILD)), "category");
        assert_eq!(channel_type(&Prompt::new("create channel x", GUILD)), "text");
    }

    #[test]
    fn multi_matcher_declines_without_names() {
        let prompt = Prompt::new("create multiple channels", GUILD);
        assert!(match_create_multiple(&prompt).is_none());
    }

    #[test]
    fn delete_extracts_token_after_noun() {
        let inv = match_delete(&Prompt::new("please delete the channel old-news now", GUILD)).unwrap();
        assert_eq!(inv.operation, "delete_channel");
        assert_eq!(inv.arguments["channel_name"], "old-news");
    }

    #[test]
    fn delete_category_uses_cascade() {
        let inv = match_delete(&Prompt::new(r#"delete category "Voice Rooms""#, GUILD)).unwrap();
        assert_eq!(inv.operation, "delete_category_and_channels");
        assert_eq!(inv.arguments["category_name"], "Voice Rooms");
    }

    #[test]
    fn delete_without_target_declines() {
        assert!(match_delete(&Prompt::new("delete a role", GUILD)).is_none());
    }

    #[test]
    fn list_needs_an_entity() {
        assert!(match_list(&Prompt::new("show me something", GUILD)).is_none());
        let inv = match_list(&Prompt::new("show all roles", GUILD)).unwrap();
        assert_eq!(inv.operation, "list_roles");
        assert_eq!(inv.arguments["guild_id"], GUILD);
    }

    #[test]
    fn backup_needs_server() {
        assert!(match_backup(&Prompt::new("backup please", GUILD)).is_none());
        assert!(match_backup(&Prompt::new("backup the server", GUILD)).is_some());
    }
}
