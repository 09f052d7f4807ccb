//! In-memory platform.
//!
//! Holds servers, channels, roles and members in process memory. Backs the
//! `warden sandbox` command and the test suite; it enforces the same
//! validation a real platform would (unknown entities, bad colors,
//! protected members) so every error path of the dispatcher is reachable.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::PlatformError;
use crate::ops::{Arguments, arg_opt_str, arg_opt_u64, arg_str, arg_str_list, arg_u64};

use super::{CategoryRef, ChannelId, ChannelRef, GuildId, Platform, UserId};

const DEMO_GUILD_ID: GuildId = 1_100_000_000_000_000_001;
const MIRROR_GUILD_ID: GuildId = 1_100_000_000_000_000_002;

const KNOWN_PERMISSIONS: &[&str] = &[
    "administrator",
    "manage_channels",
    "manage_roles",
    "manage_messages",
    "manage_nicknames",
    "kick_members",
    "ban_members",
    "moderate_members",
    "mention_everyone",
    "view_audit_log",
    "read_messages",
    "send_messages",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
}

impl FromStr for ChannelKind {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "text" => Ok(Self::Text),
            "voice" => Ok(Self::Voice),
            "category" => Ok(Self::Category),
            other => Err(PlatformError::validation(
                "channel_type",
                format!("'{other}' is not one of text, voice, category"),
            )),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Voice => write!(f, "voice"),
            Self::Category => write!(f, "category"),
        }
    }
}

#[derive(Debug, Clone)]
struct Channel {
    id: ChannelId,
    name: String,
    kind: ChannelKind,
    parent: Option<ChannelId>,
    slowmode_secs: u64,
    locked: bool,
    message_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Role {
    name: String,
    color: Option<String>,
    permissions: Vec<String>,
}

#[derive(Debug, Clone)]
struct Member {
    id: UserId,
    name: String,
    nickname: Option<String>,
    roles: Vec<String>,
    is_owner: bool,
    timeout_minutes: Option<u64>,
    message_count: u64,
}

#[derive(Debug, Clone)]
struct Guild {
    name: String,
    channels: Vec<Channel>,
    roles: Vec<Role>,
    members: Vec<Member>,
    bans: Vec<String>,
    auto_role: Option<String>,
    welcome: Option<(String, String)>,
    word_filter: Vec<String>,
    anti_spam_per_minute: Option<u64>,
    reminders: Vec<String>,
    events: Vec<String>,
}

impl Guild {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            channels: Vec::new(),
            roles: vec![Role {
                name: "@everyone".to_string(),
                color: None,
                permissions: vec!["read_messages".into(), "send_messages".into()],
            }],
            members: Vec::new(),
            bans: Vec::new(),
            auto_role: None,
            welcome: None,
            word_filter: Vec::new(),
            anti_spam_per_minute: None,
            reminders: Vec::new(),
            events: Vec::new(),
        }
    }

    fn channel(&self, name: &str) -> Result<&Channel, PlatformError> {
        let wanted = normalize_channel_name(name, ChannelKind::Text);
        self.channels
            .iter()
            .filter(|c| c.kind != ChannelKind::Category)
            .find(|c| c.name == wanted || c.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| PlatformError::not_found("Channel", name.trim()))
    }

    fn channel_mut(&mut self, name: &str) -> Result<&mut Channel, PlatformError> {
        let id = self.channel(name)?.id;
        self.channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PlatformError::not_found("Channel", name.trim()))
    }

    fn category(&self, name: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.kind == ChannelKind::Category && c.name.eq_ignore_ascii_case(name.trim()))
    }

    fn role_index(&self, name: &str) -> Result<usize, PlatformError> {
        let wanted = name.trim().trim_start_matches('@');
        self.roles
            .iter()
            .position(|r| r.name.trim_start_matches('@').eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PlatformError::not_found("Role", name.trim()))
    }

    fn member_index(&self, query: &str) -> Result<usize, PlatformError> {
        let wanted = query
            .trim()
            .trim_start_matches("<@")
            .trim_start_matches('!')
            .trim_end_matches('>')
            .trim_start_matches('@');
        let by_id = wanted.parse::<UserId>().ok();
        self.members
            .iter()
            .position(|m| {
                Some(m.id) == by_id
                    || m.name.eq_ignore_ascii_case(wanted)
                    || m.nickname
                        .as_deref()
                        .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| PlatformError::not_found("Member", query.trim()))
    }

    fn count(&self, kind: ChannelKind) -> usize {
        self.channels.iter().filter(|c| c.kind == kind).count()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Backup {
    guild_name: String,
    channels: Vec<BackupChannel>,
    roles: Vec<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupChannel {
    name: String,
    kind: ChannelKind,
    category: Option<String>,
}

struct State {
    guilds: HashMap<GuildId, Guild>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn guild_mut(&mut self, guild_id: GuildId) -> Result<&mut Guild, PlatformError> {
        self.guilds
            .get_mut(&guild_id)
            .ok_or_else(|| PlatformError::not_found("Server", guild_id.to_string()))
    }

    fn add_channel(
        &mut self,
        guild_id: GuildId,
        name: &str,
        kind: ChannelKind,
        parent: Option<ChannelId>,
    ) -> Result<ChannelId, PlatformError> {
        let id = self.next_id();
        let guild = self.guild_mut(guild_id)?;
        let name = normalize_channel_name(name, kind);
        if guild
            .channels
            .iter()
            .any(|c| c.kind == kind && c.parent == parent && c.name.eq_ignore_ascii_case(&name))
        {
            return Err(PlatformError::validation(
                "name",
                format!("a {kind} channel named '{name}' already exists there"),
            ));
        }
        guild.channels.push(Channel {
            id,
            name,
            kind,
            parent,
            slowmode_secs: 0,
            locked: false,
            message_count: 0,
        });
        Ok(id)
    }
}

/// Platform backed by process memory.
pub struct MemoryPlatform {
    state: Mutex<State>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    /// A platform with no servers.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                guilds: HashMap::new(),
                next_id: 5_000,
            }),
        }
    }

    /// A platform seeded with a demo server and an empty mirror server.
    pub fn demo() -> Self {
        let mut guild = Guild::empty("Warden Demo");
        let mut next = 10u64;
        let mut id = || {
            next += 1;
            next
        };

        let text_cat = id();
        let voice_cat = id();
        let mut channels = vec![
            category(text_cat, "Text Channels"),
            category(voice_cat, "Voice Rooms"),
        ];
        for (name, count) in [("general", 250), ("announcements", 12), ("memes", 40)] {
            channels.push(Channel {
                message_count: count,
                ..child(id(), name, ChannelKind::Text, text_cat)
            });
        }
        for name in ["Lounge", "Gaming", "Music"] {
            channels.push(child(id(), name, ChannelKind::Voice, voice_cat));
        }
        guild.channels = channels;

        guild.roles.extend([
            Role {
                name: "Admin".into(),
                color: Some("#E74C3C".into()),
                permissions: vec!["administrator".into()],
            },
            Role {
                name: "Moderator".into(),
                color: Some("#3498DB".into()),
                permissions: vec!["kick_members".into(), "manage_messages".into()],
            },
            Role {
                name: "Member".into(),
                color: None,
                permissions: vec![],
            },
        ]);

        guild.members = vec![
            member(900, "owner", &["Admin"], true, 410),
            member(901, "alice", &["Moderator"], false, 120),
            member(902, "bob", &["Member"], false, 35),
            member(903, "carol", &["Member"], false, 0),
        ];

        let mut guilds = HashMap::new();
        guilds.insert(DEMO_GUILD_ID, guild);
        guilds.insert(MIRROR_GUILD_ID, Guild::empty("Warden Mirror"));

        Self {
            state: Mutex::new(State {
                guilds,
                next_id: 5_000,
            }),
        }
    }

    /// Id of the seeded demo server.
    pub fn demo_guild_id(&self) -> GuildId {
        DEMO_GUILD_ID
    }

    /// Id of the seeded, initially empty, mirror server.
    pub fn mirror_guild_id(&self) -> GuildId {
        MIRROR_GUILD_ID
    }

    /// Add an empty server.
    pub async fn add_guild(&self, guild_id: GuildId, name: &str) {
        self.state
            .lock()
            .await
            .guilds
            .insert(guild_id, Guild::empty(name));
    }

    /// Names of all non-category channels, for assertions.
    pub async fn channel_names(&self, guild_id: GuildId) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .guilds
            .get(&guild_id)
            .map(|g| {
                g.channels
                    .iter()
                    .filter(|c| c.kind != ChannelKind::Category)
                    .map(|c| c.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of all roles, for assertions.
    pub async fn role_names(&self, guild_id: GuildId) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .guilds
            .get(&guild_id)
            .map(|g| g.roles.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether a member name is on the ban list.
    pub async fn is_banned(&self, guild_id: GuildId, name: &str) -> bool {
        let state = self.state.lock().await;
        state
            .guilds
            .get(&guild_id)
            .is_some_and(|g| g.bans.iter().any(|b| b.eq_ignore_ascii_case(name)))
    }
}

fn category(id: ChannelId, name: &str) -> Channel {
    Channel {
        id,
        name: name.to_string(),
        kind: ChannelKind::Category,
        parent: None,
        slowmode_secs: 0,
        locked: false,
        message_count: 0,
    }
}

fn child(id: ChannelId, name: &str, kind: ChannelKind, parent: ChannelId) -> Channel {
    Channel {
        id,
        name: name.to_string(),
        kind,
        parent: Some(parent),
        slowmode_secs: 0,
        locked: false,
        message_count: 0,
    }
}

fn member(id: UserId, name: &str, roles: &[&str], is_owner: bool, messages: u64) -> Member {
    Member {
        id,
        name: name.to_string(),
        nickname: None,
        roles: roles.iter().map(|r| r.to_string()).collect(),
        is_owner,
        timeout_minutes: None,
        message_count: messages,
    }
}

/// Text channel names are lowercase with dashes; voice channels and
/// categories keep their display form.
fn normalize_channel_name(name: &str, kind: ChannelKind) -> String {
    let name = name.trim().trim_start_matches('#');
    match kind {
        ChannelKind::Text => name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase(),
        _ => name.to_string(),
    }
}

fn channel_flags(channel: &Channel) -> String {
    let mut flags = String::new();
    if channel.locked {
        flags.push_str(" 🔒");
    }
    if channel.slowmode_secs > 0 {
        flags.push_str(&format!(" 🐢{}s", channel.slowmode_secs));
    }
    flags
}

fn validate_color(color: &str) -> Result<String, PlatformError> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(format!("#{}", hex.to_uppercase()))
    } else {
        Err(PlatformError::validation(
            "color",
            format!("'{}' is not a #RRGGBB hex color", color.trim()),
        ))
    }
}

fn validate_permissions(permissions: Vec<String>) -> Result<Vec<String>, PlatformError> {
    permissions
        .into_iter()
        .map(|p| {
            let norm = p.trim().to_lowercase().replace([' ', '-'], "_");
            if KNOWN_PERMISSIONS.contains(&norm.as_str()) {
                Ok(norm)
            } else {
                Err(PlatformError::validation(
                    "permissions",
                    format!("unknown permission '{}'", p.trim()),
                ))
            }
        })
        .collect()
}

fn protect_owner(member: &Member, action: &str) -> Result<(), PlatformError> {
    if member.is_owner {
        return Err(PlatformError::Forbidden {
            action: format!("{action} the server owner"),
        });
    }
    Ok(())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn invoke(&self, operation: &str, args: &Arguments) -> Result<String, PlatformError> {
        let mut state = self.state.lock().await;
        let guild_id = arg_u64(args, "guild_id")?;
        tracing::debug!(operation, guild_id, "Memory platform invoke");

        match operation {
            "list_channels" => {
                let guild = state.guild_mut(guild_id)?;
                let mut out = format!("📋 **Channels in {}**", guild.name);
                let loose: Vec<&Channel> = guild
                    .channels
                    .iter()
                    .filter(|c| c.kind != ChannelKind::Category && c.parent.is_none())
                    .collect();
                for c in loose {
                    out.push_str(&format!("\n• {} ({}){}", c.name, c.kind, channel_flags(c)));
                }
                for cat in guild.channels.iter().filter(|c| c.kind == ChannelKind::Category) {
                    out.push_str(&format!("\n📁 {}", cat.name));
                    for c in guild.channels.iter().filter(|c| c.parent == Some(cat.id)) {
                        out.push_str(&format!("\n  • {} ({}){}", c.name, c.kind, channel_flags(c)));
                    }
                }
                Ok(out)
            }
            "create_channel" => {
                let name = arg_str(args, "name")?;
                let kind: ChannelKind = arg_opt_str(args, "channel_type").unwrap_or("text").parse()?;
                let parent = match arg_opt_str(args, "category_name") {
                    Some(cat) if kind != ChannelKind::Category => Some(
                        state
                            .guild_mut(guild_id)?
                            .category(cat)
                            .map(|c| c.id)
                            .ok_or_else(|| PlatformError::not_found("Category", cat))?,
                    ),
                    _ => None,
                };
                state.add_channel(guild_id, name, kind, parent)?;
                Ok(format!(
                    "✅ Created {} channel '{}'",
                    kind,
                    normalize_channel_name(name, kind)
                ))
            }
            "delete_channel" => {
                let name = arg_str(args, "channel_name")?;
                let guild = state.guild_mut(guild_id)?;
                let id = guild.channel(name)?.id;
                guild.channels.retain(|c| c.id != id);
                Ok(format!("🗑️ Deleted channel '{name}'"))
            }
            "set_slowmode" => {
                let name = arg_str(args, "channel_name")?;
                let seconds = arg_u64(args, "seconds")?;
                if seconds > 21_600 {
                    return Err(PlatformError::validation("seconds", "must be at most 21600"));
                }
                state.guild_mut(guild_id)?.channel_mut(name)?.slowmode_secs = seconds;
                Ok(if seconds == 0 {
                    format!("🐇 Slowmode disabled in '{name}'")
                } else {
                    format!("🐢 Slowmode in '{name}' set to {seconds}s")
                })
            }
            "lock_channel" | "unlock_channel" => {
                let name = arg_str(args, "channel_name")?;
                let lock = operation == "lock_channel";
                state.guild_mut(guild_id)?.channel_mut(name)?.locked = lock;
                Ok(if lock {
                    format!("🔒 Locked '{name}'")
                } else {
                    format!("🔓 Unlocked '{name}'")
                })
            }
            "create_invite_with_perms" => {
                let name = arg_str(args, "channel_name")?;
                let max_uses = arg_opt_u64(args, "max_uses")?.unwrap_or(0);
                let channel_id = state.guild_mut(guild_id)?.channel(name)?.id;
                let uses = if max_uses == 0 {
                    "unlimited uses".to_string()
                } else {
                    format!("{max_uses} uses")
                };
                Ok(format!(
                    "🔗 Invite for '{name}': https://discord.gg/w{channel_id:x} ({uses})"
                ))
            }
            "list_roles" => {
                let guild = state.guild_mut(guild_id)?;
                let mut out = format!("🎭 **Roles in {}** ({})", guild.name, guild.roles.len());
                for role in &guild.roles {
                    out.push_str(&format!(
                        "\n• {} {}",
                        role.name,
                        role.color.as_deref().unwrap_or("")
                    ));
                }
                Ok(out.trim_end().to_string())
            }
            "create_role" => {
                let name = arg_str(args, "role_name")?;
                let color = arg_opt_str(args, "color").map(validate_color).transpose()?;
                let permissions = match args.get("permissions") {
                    Some(v) if !v.is_null() => {
                        validate_permissions(arg_str_list(args, "permissions")?)?
                    }
                    _ => Vec::new(),
                };
                let guild = state.guild_mut(guild_id)?;
                if guild.role_index(name).is_ok() {
                    return Err(PlatformError::validation(
                        "role_name",
                        format!("a role named '{name}' already exists"),
                    ));
                }
                let color_note = color
                    .as_deref()
                    .map(|c| format!(" with color {c}"))
                    .unwrap_or_default();
                guild.roles.push(Role {
                    name: name.to_string(),
                    color,
                    permissions,
                });
                Ok(format!("✅ Created role '{name}'{color_note}"))
            }
            "delete_role" => {
                let name = arg_str(args, "role_name")?;
                let guild = state.guild_mut(guild_id)?;
                let idx = guild.role_index(name)?;
                if guild.roles[idx].name == "@everyone" {
                    return Err(PlatformError::Forbidden {
                        action: "delete the @everyone role".into(),
                    });
                }
                let removed = guild.roles.remove(idx);
                for m in &mut guild.members {
                    m.roles.retain(|r| r != &removed.name);
                }
                Ok(format!("🗑️ Deleted role '{}'", removed.name))
            }
            "assign_role" | "remove_role" => {
                let member_q = arg_str(args, "member")?;
                let role_q = arg_str(args, "role_name")?;
                let guild = state.guild_mut(guild_id)?;
                let role = guild.roles[guild.role_index(role_q)?].name.clone();
                let idx = guild.member_index(member_q)?;
                let m = &mut guild.members[idx];
                if operation == "assign_role" {
                    if !m.roles.contains(&role) {
                        m.roles.push(role.clone());
                    }
                    Ok(format!("✅ Gave '{}' the role '{}'", m.name, role))
                } else {
                    m.roles.retain(|r| r != &role);
                    Ok(format!("✅ Removed role '{}' from '{}'", role, m.name))
                }
            }
            "update_role_permissions" => {
                let name = arg_str(args, "role_name")?;
                let permissions = validate_permissions(arg_str_list(args, "permissions")?)?;
                let guild = state.guild_mut(guild_id)?;
                let idx = guild.role_index(name)?;
                guild.roles[idx].permissions = permissions.clone();
                Ok(format!(
                    "🔐 Role '{}' permissions set to: {}",
                    guild.roles[idx].name,
                    if permissions.is_empty() {
                        "none".to_string()
                    } else {
                        permissions.join(", ")
                    }
                ))
            }
            "setup_auto_role" => {
                let name = arg_str(args, "role_name")?;
                let guild = state.guild_mut(guild_id)?;
                let role = guild.roles[guild.role_index(name)?].name.clone();
                guild.auto_role = Some(role.clone());
                Ok(format!("🤖 New members will receive '{role}'"))
            }
            "kick_member" | "ban_member" => {
                let member_q = arg_str(args, "member")?;
                let reason = arg_opt_str(args, "reason").unwrap_or("No reason provided");
                let days = arg_opt_u64(args, "delete_message_days")?.unwrap_or(0);
                if days > 7 {
                    return Err(PlatformError::validation(
                        "delete_message_days",
                        "must be between 0 and 7",
                    ));
                }
                let guild = state.guild_mut(guild_id)?;
                let idx = guild.member_index(member_q)?;
                let verb = if operation == "kick_member" { "kick" } else { "ban" };
                protect_owner(&guild.members[idx], verb)?;
                let removed = guild.members.remove(idx);
                if operation == "ban_member" {
                    guild.bans.push(removed.name.clone());
                    Ok(format!("🔨 Banned '{}' (Reason: {})", removed.name, reason))
                } else {
                    Ok(format!("👢 Kicked '{}' (Reason: {})", removed.name, reason))
                }
            }
            "unban_member" => {
                let name = arg_str(args, "member")?;
                let guild = state.guild_mut(guild_id)?;
                let before = guild.bans.len();
                guild.bans.retain(|b| !b.eq_ignore_ascii_case(name));
                if guild.bans.len() == before {
                    return Err(PlatformError::not_found("Ban", name));
                }
                Ok(format!("✅ Unbanned '{name}'"))
            }
            "timeout_member" => {
                let member_q = arg_str(args, "member")?;
                let minutes = arg_u64(args, "minutes")?;
                if minutes == 0 || minutes > 40_320 {
                    return Err(PlatformError::validation(
                        "minutes",
                        "must be between 1 and 40320 (28 days)",
                    ));
                }
                let guild = state.guild_mut(guild_id)?;
                let idx = guild.member_index(member_q)?;
                protect_owner(&guild.members[idx], "time out")?;
                let m = &mut guild.members[idx];
                m.timeout_minutes = Some(minutes);
                Ok(format!("🔇 Timed out '{}' for {} minutes", m.name, minutes))
            }
            "remove_timeout" => {
                let member_q = arg_str(args, "member")?;
                let guild = state.guild_mut(guild_id)?;
                let idx = guild.member_index(member_q)?;
                let m = &mut guild.members[idx];
                m.timeout_minutes = None;
                Ok(format!("🔊 Removed timeout from '{}'", m.name))
            }
            "set_nickname" => {
                let member_q = arg_str(args, "member")?;
                let nickname = arg_str(args, "nickname")?;
                if nickname.chars().count() > 32 {
                    return Err(PlatformError::validation(
                        "nickname",
                        "must be at most 32 characters",
                    ));
                }
                let guild = state.guild_mut(guild_id)?;
                let idx = guild.member_index(member_q)?;
                let m = &mut guild.members[idx];
                m.nickname = Some(nickname.to_string());
                Ok(format!("✏️ '{}' is now known as '{}'", m.name, nickname))
            }
            "purge_messages" | "delete_message_bulk" => {
                let name = arg_str(args, "channel_name")?;
                let limit = arg_u64(args, "limit")?;
                let max = if operation == "delete_message_bulk" { 100 } else { 1_000 };
                if limit == 0 || limit > max {
                    return Err(PlatformError::validation(
                        "limit",
                        format!("must be between 1 and {max}"),
                    ));
                }
                let channel = state.guild_mut(guild_id)?.channel_mut(name)?;
                let deleted = limit.min(channel.message_count);
                channel.message_count -= deleted;
                Ok(format!("🧹 Deleted {deleted} messages from '{}'", channel.name))
            }
            "setup_word_filter" => {
                let words = arg_str_list(args, "words")?;
                if words.is_empty() {
                    return Err(PlatformError::validation("words", "at least one word is required"));
                }
                let guild = state.guild_mut(guild_id)?;
                guild.word_filter = words.iter().map(|w| w.to_lowercase()).collect();
                Ok(format!("🚫 Word filter active with {} banned words", words.len()))
            }
            "setup_anti_spam" => {
                let rate = arg_u64(args, "max_messages_per_minute")?;
                if rate == 0 {
                    return Err(PlatformError::validation(
                        "max_messages_per_minute",
                        "must be at least 1",
                    ));
                }
                state.guild_mut(guild_id)?.anti_spam_per_minute = Some(rate);
                Ok(format!("🛡️ Anti-spam limit set to {rate} msgs/min"))
            }
            "track_member_activity" => {
                let member_q = arg_str(args, "member")?;
                let guild = state.guild_mut(guild_id)?;
                let m = &guild.members[guild.member_index(member_q)?];
                Ok(format!(
                    "📈 '{}' has sent {} messages; roles: {}",
                    m.name,
                    m.message_count,
                    if m.roles.is_empty() {
                        "none".to_string()
                    } else {
                        m.roles.join(", ")
                    }
                ))
            }
            "get_server_stats" => {
                let guild = state.guild_mut(guild_id)?;
                let mut out = format!(
                    "📊 **{}**\nMembers: {}\nText channels: {}\nVoice channels: {}\nCategories: {}\nRoles: {}\nBans: {}",
                    guild.name,
                    guild.members.len(),
                    guild.count(ChannelKind::Text),
                    guild.count(ChannelKind::Voice),
                    guild.count(ChannelKind::Category),
                    guild.roles.len(),
                    guild.bans.len()
                );
                let timed_out = guild.members.iter().filter(|m| m.timeout_minutes.is_some()).count();
                if timed_out > 0 {
                    out.push_str(&format!("\nTimed out: {timed_out}"));
                }
                if let Some(role) = &guild.auto_role {
                    out.push_str(&format!("\nAuto-role: {role}"));
                }
                if let Some((channel, _)) = &guild.welcome {
                    out.push_str(&format!("\nWelcome channel: {channel}"));
                }
                if !guild.word_filter.is_empty() {
                    out.push_str(&format!("\nFiltered words: {}", guild.word_filter.len()));
                }
                if let Some(rate) = guild.anti_spam_per_minute {
                    out.push_str(&format!("\nAnti-spam: {rate} msgs/min"));
                }
                if !guild.events.is_empty() || !guild.reminders.is_empty() {
                    out.push_str(&format!(
                        "\nScheduled: {} events, {} reminders",
                        guild.events.len(),
                        guild.reminders.len()
                    ));
                }
                Ok(out)
            }
            "backup_server" => {
                let guild = state.guild_mut(guild_id)?;
                let backup = Backup {
                    guild_name: guild.name.clone(),
                    channels: guild
                        .channels
                        .iter()
                        .map(|c| BackupChannel {
                            name: c.name.clone(),
                            kind: c.kind,
                            category: c.parent.and_then(|p| {
                                guild.channels.iter().find(|x| x.id == p).map(|x| x.name.clone())
                            }),
                        })
                        .collect(),
                    roles: guild.roles.clone(),
                };
                let json = serde_json::to_string(&backup).map_err(|e| PlatformError::Unavailable {
                    reason: format!("backup serialization failed: {e}"),
                })?;
                Ok(format!(
                    "💾 Backup of '{}' created: {} channels, {} roles\n```json\n{}\n```",
                    backup.guild_name,
                    backup.channels.len(),
                    backup.roles.len(),
                    json
                ))
            }
            "restore_server" => {
                let raw = arg_str(args, "backup")?;
                let backup: Backup = serde_json::from_str(strip_code_fence(raw))
                    .map_err(|e| PlatformError::validation("backup", e.to_string()))?;
                restore_into(&mut state, guild_id, &backup)
            }
            "execute_cross_server_clone" => {
                let target = arg_u64(args, "target_guild_id")?;
                if target == guild_id {
                    return Err(PlatformError::validation(
                        "target_guild_id",
                        "target must differ from the source server",
                    ));
                }
                let source = state.guild_mut(guild_id)?.clone();
                let backup = Backup {
                    guild_name: source.name.clone(),
                    channels: source
                        .channels
                        .iter()
                        .map(|c| BackupChannel {
                            name: c.name.clone(),
                            kind: c.kind,
                            category: c.parent.and_then(|p| {
                                source.channels.iter().find(|x| x.id == p).map(|x| x.name.clone())
                            }),
                        })
                        .collect(),
                    roles: source.roles.clone(),
                };
                let summary = restore_into(&mut state, target, &backup)?;
                Ok(format!("📤 Cloned '{}' to server {target}\n{summary}", source.name))
            }
            "setup_welcome_message" => {
                let channel = arg_str(args, "channel_name")?.to_string();
                let message = arg_str(args, "message")?.to_string();
                let guild = state.guild_mut(guild_id)?;
                let channel = guild.channel(&channel)?.name.clone();
                guild.welcome = Some((channel.clone(), message));
                Ok(format!("👋 Welcome messages will be posted in '{channel}'"))
            }
            "set_reminder" => {
                let member_q = arg_str(args, "member")?;
                let minutes = arg_u64(args, "minutes")?;
                let message = arg_str(args, "message")?;
                let guild = state.guild_mut(guild_id)?;
                let name = guild.members[guild.member_index(member_q)?].name.clone();
                guild.reminders.push(format!("{name}: {message}"));
                Ok(format!("⏰ Reminder for '{name}' in {minutes} minutes: {message}"))
            }
            "schedule_event" => {
                let name = arg_str(args, "name")?;
                let start = arg_str(args, "start_time")?;
                let when = chrono::DateTime::parse_from_rfc3339(start).map_err(|e| {
                    PlatformError::validation("start_time", format!("'{start}' is not RFC 3339: {e}"))
                })?;
                let guild = state.guild_mut(guild_id)?;
                guild.events.push(name.to_string());
                Ok(format!(
                    "📅 Scheduled '{}' for {}",
                    name,
                    when.format("%Y-%m-%d %H:%M %Z")
                ))
            }
            "create_poll" => {
                let channel = arg_str(args, "channel_name")?;
                let question = arg_str(args, "question")?;
                let options = arg_str_list(args, "options")?;
                if !(2..=10).contains(&options.len()) {
                    return Err(PlatformError::validation("options", "between 2 and 10 options are required"));
                }
                let channel = state.guild_mut(guild_id)?.channel(channel)?.name.clone();
                let mut out = format!("📊 Poll posted in '{channel}': **{question}**");
                for (i, option) in options.iter().enumerate() {
                    out.push_str(&format!("\n{}. {}", i + 1, option));
                }
                Ok(out)
            }
            other => Err(PlatformError::Unavailable {
                reason: format!("operation '{other}' is not supported by this platform"),
            }),
        }
    }

    async fn find_category(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<CategoryRef, PlatformError> {
        let mut state = self.state.lock().await;
        let guild = state.guild_mut(guild_id)?;
        let cat = guild
            .category(name)
            .ok_or_else(|| PlatformError::not_found("Category", name.trim()))?;
        Ok(CategoryRef {
            id: cat.id,
            name: cat.name.clone(),
            channels: guild
                .channels
                .iter()
                .filter(|c| c.parent == Some(cat.id))
                .map(|c| ChannelRef {
                    id: c.id,
                    name: c.name.clone(),
                })
                .collect(),
        })
    }

    async fn delete_channel_by_id(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        let guild = state.guild_mut(guild_id)?;
        let before = guild.channels.len();
        guild.channels.retain(|c| c.id != channel_id);
        if guild.channels.len() == before {
            return Err(PlatformError::not_found("Channel", channel_id.to_string()));
        }
        for c in &mut guild.channels {
            if c.parent == Some(channel_id) {
                c.parent = None;
            }
        }
        Ok(())
    }

    async fn guild_name(&self, guild_id: GuildId) -> Result<String, PlatformError> {
        let mut state = self.state.lock().await;
        Ok(state.guild_mut(guild_id)?.name.clone())
    }
}

/// Recreate channels and roles from a backup, skipping ones that exist.
fn restore_into(
    state: &mut State,
    guild_id: GuildId,
    backup: &Backup,
) -> Result<String, PlatformError> {
    state.guild_mut(guild_id)?;
    let mut created_channels = 0usize;
    let mut created_roles = 0usize;

    for cat in backup.channels.iter().filter(|c| c.kind == ChannelKind::Category) {
        if state.guild_mut(guild_id)?.category(&cat.name).is_none() {
            state.add_channel(guild_id, &cat.name, ChannelKind::Category, None)?;
            created_channels += 1;
        }
    }
    for ch in backup.channels.iter().filter(|c| c.kind != ChannelKind::Category) {
        let parent = match &ch.category {
            Some(cat) => state.guild_mut(guild_id)?.category(cat).map(|c| c.id),
            None => None,
        };
        if state.add_channel(guild_id, &ch.name, ch.kind, parent).is_ok() {
            created_channels += 1;
        }
    }
    let guild = state.guild_mut(guild_id)?;
    for role in backup.roles.iter().filter(|r| r.name != "@everyone") {
        if guild.role_index(&role.name).is_err() {
            guild.roles.push(Role {
                name: role.name.clone(),
                color: role.color.clone(),
                permissions: role.permissions.clone(),
            });
            created_roles += 1;
        }
    }

    Ok(format!(
        "♻️ Restored {created_channels} channels and {created_roles} roles from '{}'",
        backup.guild_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn create_and_delete_channel() {
        let platform = MemoryPlatform::demo();
        let guild = platform.demo_guild_id();

        let out = platform
            .invoke(
                "create_channel",
                &args(json!({"guild_id": guild, "name": "Dev Chat", "channel_type": "text"})),
            )
            .await
            .unwrap();
        assert!(out.contains("dev-chat"));
        assert!(platform.channel_names(guild).await.contains(&"dev-chat".to_string()));

        platform
            .invoke(
                "delete_channel",
                &args(json!({"guild_id": guild, "channel_name": "dev chat"})),
            )
            .await
            .unwrap();
        assert!(!platform.channel_names(guild).await.contains(&"dev-chat".to_string()));
    }

    #[tokio::test]
    async fn duplicate_channel_is_a_validation_error() {
        let platform = MemoryPlatform::demo();
        let first = platform
            .invoke(
                "create_channel",
                &args(json!({"guild_id": platform.demo_guild_id(), "name": "general"})),
            )
            .await;
        // the seeded general lives in a category, so a top-level one is new
        assert!(first.is_ok());
        let err = platform
            .invoke(
                "create_channel",
                &args(json!({"guild_id": platform.demo_guild_id(), "name": "general"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
    }

    #[tokio::test]
    async fn bad_color_is_rejected() {
        let platform = MemoryPlatform::demo();
        let err = platform
            .invoke(
                "create_role",
                &args(json!({"guild_id": platform.demo_guild_id(), "role_name": "VIP", "color": "#12345"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation { ref field, .. } if field == "color"));
    }

    #[tokio::test]
    async fn owner_cannot_be_banned() {
        let platform = MemoryPlatform::demo();
        let err = platform
            .invoke(
                "ban_member",
                &args(json!({"guild_id": platform.demo_guild_id(), "member": "owner"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn ban_records_member() {
        let platform = MemoryPlatform::demo();
        let guild = platform.demo_guild_id();
        let out = platform
            .invoke(
                "ban_member",
                &args(json!({"guild_id": guild, "member": "<@902>", "reason": "spam"})),
            )
            .await
            .unwrap();
        assert_eq!(out, "🔨 Banned 'bob' (Reason: spam)");
        assert!(platform.is_banned(guild, "bob").await);
    }

    #[tokio::test]
    async fn unknown_server_is_not_found() {
        let platform = MemoryPlatform::demo();
        let err = platform
            .invoke("list_roles", &args(json!({"guild_id": 7})))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { ref entity, .. } if entity == "Server"));
    }

    #[tokio::test]
    async fn backup_then_restore_into_empty_server() {
        let platform = MemoryPlatform::demo();
        let guild = platform.demo_guild_id();
        let backup = platform
            .invoke("backup_server", &args(json!({"guild_id": guild})))
            .await
            .unwrap();
        let doc = backup.split_once('\n').map(|(_, rest)| rest).unwrap();

        let mirror = platform.mirror_guild_id();
        let out = platform
            .invoke(
                "restore_server",
                &args(json!({"guild_id": mirror, "backup": doc})),
            )
            .await
            .unwrap();
        assert!(out.contains("Restored 8 channels and 3 roles"), "{out}");
        let roles = platform.role_names(mirror).await;
        assert!(roles.contains(&"Moderator".to_string()));
        assert_eq!(roles.iter().filter(|r| r.as_str() == "@everyone").count(), 1);
    }

    #[tokio::test]
    async fn purge_caps_at_available_messages() {
        let platform = MemoryPlatform::demo();
        let guild = platform.demo_guild_id();
        let out = platform
            .invoke(
                "purge_messages",
                &args(json!({"guild_id": guild, "channel_name": "memes", "limit": 500})),
            )
            .await
            .unwrap();
        assert_eq!(out, "🧹 Deleted 40 messages from 'memes'");

        let err = platform
            .invoke(
                "delete_message_bulk",
                &args(json!({"guild_id": guild, "channel_name": "memes", "limit": 500})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
    }
}
