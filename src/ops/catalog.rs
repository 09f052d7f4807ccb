//! Compiled-in operation catalog.
//!
//! One entry per platform operation the bot exposes. `dangerous` marks
//! operations that must pass through the confirmation arbiter.

use super::{OperationSpec, ParamSpec, ParamType as T};

const GUILD: ParamSpec = ParamSpec::required("guild_id", T::Integer, "Target server id");
const MEMBER: ParamSpec = ParamSpec::required("member", T::String, "Member name or id");
const CHANNEL: ParamSpec = ParamSpec::required("channel_name", T::String, "Channel name");
const ROLE: ParamSpec = ParamSpec::required("role_name", T::String, "Role name");
const REASON: ParamSpec = ParamSpec::optional("reason", T::String, "Reason recorded in the audit log");

pub static CATALOG: &[OperationSpec] = &[
    // Channels
    OperationSpec {
        name: "list_channels",
        description: "List all channels in the server grouped by category.",
        parameters: &[GUILD],
        dangerous: false,
    },
    OperationSpec {
        name: "create_channel",
        description: "Create a text channel, voice channel or category.",
        parameters: &[
            GUILD,
            ParamSpec::required("name", T::String, "Channel name"),
            ParamSpec::optional("channel_type", T::String, "One of text, voice, category"),
            ParamSpec::optional("category_name", T::String, "Category to create the channel in"),
        ],
        dangerous: false,
    },
    OperationSpec {
        name: "delete_channel",
        description: "Delete a channel.",
        parameters: &[GUILD, CHANNEL],
        dangerous: true,
    },
    OperationSpec {
        name: "delete_category_and_channels",
        description: "Delete a category and every channel inside it.",
        parameters: &[
            GUILD,
            ParamSpec::required("category_name", T::String, "Category name"),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "set_slowmode",
        description: "Set slowmode delay on a channel (0 disables).",
        parameters: &[
            GUILD,
            CHANNEL,
            ParamSpec::required("seconds", T::Integer, "Delay between messages in seconds"),
        ],
        dangerous: false,
    },
    OperationSpec {
        name: "lock_channel",
        description: "Prevent members from sending messages in a channel.",
        parameters: &[GUILD, CHANNEL],
        dangerous: false,
    },
    OperationSpec {
        name: "unlock_channel",
        description: "Allow members to send messages in a channel again.",
        parameters: &[GUILD, CHANNEL],
        dangerous: false,
    },
    OperationSpec {
        name: "create_invite_with_perms",
        description: "Create an invite link for a channel.",
        parameters: &[
            GUILD,
            CHANNEL,
            ParamSpec::optional("max_uses", T::Integer, "Maximum uses (0 = unlimited)"),
        ],
        dangerous: true,
    },
    // Roles
    OperationSpec {
        name: "list_roles",
        description: "List all roles in the server.",
        parameters: &[GUILD],
        dangerous: false,
    },
    OperationSpec {
        name: "create_role",
        description: "Create a role with an optional color and permission set.",
        parameters: &[
            GUILD,
            ROLE,
            ParamSpec::optional("color", T::String, "Hex color such as #FF0000"),
            ParamSpec::optional("permissions", T::StringList, "Permission names to grant"),
        ],
        dangerous: false,
    },
    OperationSpec {
        name: "delete_role",
        description: "Delete a role.",
        parameters: &[GUILD, ROLE],
        dangerous: true,
    },
    OperationSpec {
        name: "assign_role",
        description: "Give a role to a member.",
        parameters: &[GUILD, MEMBER, ROLE],
        dangerous: false,
    },
    OperationSpec {
        name: "remove_role",
        description: "Take a role away from a member.",
        parameters: &[GUILD, MEMBER, ROLE],
        dangerous: false,
    },
    OperationSpec {
        name: "update_role_permissions",
        description: "Replace the permission set of a role.",
        parameters: &[
            GUILD,
            ROLE,
            ParamSpec::required("permissions", T::StringList, "Permission names to grant"),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "setup_auto_role",
        description: "Assign a role automatically to new members.",
        parameters: &[GUILD, ROLE],
        dangerous: false,
    },
    // Members and moderation
    OperationSpec {
        name: "kick_member",
        description: "Kick a member from the server.",
        parameters: &[GUILD, MEMBER, REASON],
        dangerous: true,
    },
    OperationSpec {
        name: "ban_member",
        description: "Ban a member from the server.",
        parameters: &[
            GUILD,
            MEMBER,
            REASON,
            ParamSpec::optional(
                "delete_message_days",
                T::Integer,
                "Days of message history to delete (0-7)",
            ),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "unban_member",
        description: "Lift a ban.",
        parameters: &[GUILD, MEMBER],
        dangerous: false,
    },
    OperationSpec {
        name: "timeout_member",
        description: "Temporarily mute a member.",
        parameters: &[
            GUILD,
            MEMBER,
            ParamSpec::required("minutes", T::Integer, "Timeout length in minutes"),
            REASON,
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "remove_timeout",
        description: "Lift a member's timeout.",
        parameters: &[GUILD, MEMBER],
        dangerous: false,
    },
    OperationSpec {
        name: "set_nickname",
        description: "Change a member's nickname.",
        parameters: &[
            GUILD,
            MEMBER,
            ParamSpec::required("nickname", T::String, "New nickname"),
        ],
        dangerous: false,
    },
    OperationSpec {
        name: "purge_messages",
        description: "Delete the most recent messages in a channel.",
        parameters: &[
            GUILD,
            CHANNEL,
            ParamSpec::required("limit", T::Integer, "Number of messages to delete"),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "delete_message_bulk",
        description: "Bulk delete messages in a channel.",
        parameters: &[
            GUILD,
            CHANNEL,
            ParamSpec::required("limit", T::Integer, "Number of messages to delete"),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "setup_word_filter",
        description: "Delete messages containing any of the given words.",
        parameters: &[
            GUILD,
            ParamSpec::required("words", T::StringList, "Banned words"),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "setup_anti_spam",
        description: "Limit how many messages a member may send per minute.",
        parameters: &[
            GUILD,
            ParamSpec::required("max_messages_per_minute", T::Integer, "Message rate limit"),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "track_member_activity",
        description: "Report a member's recent activity.",
        parameters: &[GUILD, MEMBER],
        dangerous: false,
    },
    // Server
    OperationSpec {
        name: "get_server_stats",
        description: "Show member, channel and role counts.",
        parameters: &[GUILD],
        dangerous: false,
    },
    OperationSpec {
        name: "backup_server",
        description: "Snapshot channels and roles into a backup document.",
        parameters: &[GUILD],
        dangerous: false,
    },
    OperationSpec {
        name: "restore_server",
        description: "Recreate channels and roles from a backup document.",
        parameters: &[
            GUILD,
            ParamSpec::required("backup", T::String, "Backup document produced by backup_server"),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "execute_cross_server_clone",
        description: "Copy channels and roles from this server to another server.",
        parameters: &[
            GUILD,
            ParamSpec::required("target_guild_id", T::Integer, "Destination server id"),
        ],
        dangerous: true,
    },
    OperationSpec {
        name: "setup_welcome_message",
        description: "Greet new members in a channel.",
        parameters: &[
            GUILD,
            CHANNEL,
            ParamSpec::required("message", T::String, "Welcome text; {user} is replaced"),
        ],
        dangerous: false,
    },
    // Scheduling and engagement
    OperationSpec {
        name: "set_reminder",
        description: "Remind a member about something after a delay.",
        parameters: &[
            GUILD,
            MEMBER,
            ParamSpec::required("minutes", T::Integer, "Delay in minutes"),
            ParamSpec::required("message", T::String, "Reminder text"),
        ],
        dangerous: false,
    },
    OperationSpec {
        name: "schedule_event",
        description: "Schedule a server event.",
        parameters: &[
            GUILD,
            ParamSpec::required("name", T::String, "Event name"),
            ParamSpec::required("start_time", T::String, "RFC 3339 start time"),
            ParamSpec::optional("description", T::String, "Event description"),
        ],
        dangerous: false,
    },
    OperationSpec {
        name: "create_poll",
        description: "Post a poll with numbered options.",
        parameters: &[
            GUILD,
            CHANNEL,
            ParamSpec::required("question", T::String, "Poll question"),
            ParamSpec::required("options", T::StringList, "Between 2 and 10 options"),
        ],
        dangerous: false,
    },
    // Bot
    OperationSpec {
        name: "get_api_status",
        description: "Show the health of the configured language-model providers.",
        parameters: &[],
        dangerous: false,
    },
];
