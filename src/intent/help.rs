//! Canned usage help.

use super::extract::Prompt;

/// Phrases matched as consecutive whole words.
const HELP_PHRASES: &[&str] = &[
    "how do i",
    "how to",
    "how can i",
    "what commands",
    "commands can i",
];

/// Single words matched against whole tokens.
const HELP_WORDS: &[&str] = &["usage", "example", "help", "guide", "tutorial"];

/// Help topic chosen from the rest of the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    MultiChannel,
    Roles,
    Listing,
    Moderation,
    General,
}

impl HelpTopic {
    pub fn text(self) -> &'static str {
        match self {
            HelpTopic::MultiChannel => MULTI_CHANNEL_HELP,
            HelpTopic::Roles => ROLES_HELP,
            HelpTopic::Listing => LISTING_HELP,
            HelpTopic::Moderation => MODERATION_HELP,
            HelpTopic::General => GENERAL_HELP,
        }
    }
}

pub(crate) fn is_help_request(prompt: &Prompt<'_>) -> bool {
    HELP_PHRASES.iter().any(|p| prompt.has_phrase(p)) || prompt.has_any_word(HELP_WORDS)
}

/// Detect a help request and pick its topic.
pub(crate) fn detect(prompt: &Prompt<'_>) -> Option<HelpTopic> {
    if !is_help_request(prompt) {
        return None;
    }
    let lower = prompt.lower.as_str();
    let mentions = |phrases: &[&str]| phrases.iter().any(|p| lower.contains(p));

    let topic = if mentions(&[
        "multiple channels",
        "several channels",
        "2 channels",
        "make multiple",
        "create multiple",
    ]) {
        HelpTopic::MultiChannel
    } else if mentions(&["role"]) {
        HelpTopic::Roles
    } else if prompt.has_any_word(&["list", "show", "see", "view"]) {
        HelpTopic::Listing
    } else if prompt.has_any_word(&["delete", "remove", "kick", "ban", "moderation", "moderate"]) {
        HelpTopic::Moderation
    } else {
        HelpTopic::General
    };
    Some(topic)
}

const MULTI_CHANNEL_HELP: &str = "**🔧 Creating several channels**

One at a time:
• `/askai create channel general`
• `/askai make a channel called announcements`

Several in one request:
• `/askai create channels general and announcements`
• `/askai make multiple channels called general, announcements, chat`

Voice channels and categories:
• `/askai create voice channels Music and Study`
• `/askai create a category called \"Voice Rooms\"`";

const ROLES_HELP: &str = "**👑 Working with roles**

• `/askai create role Member`
• `/askai create role VIP with color red`
• `/askai make role Admin with color #FF0000`
• `/askai create roles Moderator, Helper`
• `/askai list roles`
• `/askai delete role OldRole` ⚠️ needs confirmation";

const LISTING_HELP: &str = "**📋 Looking around the server**

• `/askai list channels`
• `/askai show roles`
• `/askai get server stats`
• `/askai backup the server`";

const MODERATION_HELP: &str = "**⚠️ Moderation**

Every command below asks for confirmation first. React with ✅ or ❌ on the notice, \
or reply `yes` / `no`.

• `/askai delete channel old-chat`
• `/askai delete category \"Old Stuff\"` removes every channel inside it
• `/askai kick member bob`
• `/askai ban member bob for spamming`
• `/askai purge 50 messages in #general`

These actions cannot be undone.";

const GENERAL_HELP: &str = "**🤖 Quick start**

Channels: `/askai create channel <name>`, `/askai create voice channel <name>`, \
`/askai create channels <a> and <b>`, `/askai list channels`
Roles: `/askai create role <name> with color <color>`, `/askai list roles`
Server: `/askai get server stats`, `/askai backup the server`
Moderation (confirmation required): `/askai delete channel <name>`, \
`/askai kick member <name>`, `/askai ban member <name>`

Plain language works: \"make a channel called general\". Colors can be a name \
like red or a hex code like #FF0000.

Ask \"how to create channels\" or \"help with roles\" for more.";
