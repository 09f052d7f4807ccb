use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_string_env, required_env};
use crate::error::ConfigError;
use crate::platform::UserId;

/// Default legacy text prefix for owner-only invocations.
pub const DEFAULT_LEGACY_PREFIX: &str = "¬askai";

/// Chat platform credentials and identities.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: SecretString,
    /// Owner identity; always authorized to confirm dangerous operations.
    pub owner_id: UserId,
    pub legacy_prefix: String,
}

impl BotConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let token = required_env(
            "DISCORD_BOT_TOKEN",
            "Create a bot application and copy its token into .env",
        )?;
        Ok(Self {
            token: SecretString::from(token),
            owner_id: resolve_owner_id()?,
            legacy_prefix: parse_string_env("WARDEN_LEGACY_PREFIX", DEFAULT_LEGACY_PREFIX)?,
        })
    }
}

/// Read `DISCORD_OWNER_ID`, which must be a numeric user id.
pub fn resolve_owner_id() -> Result<UserId, ConfigError> {
    let raw = optional_env("DISCORD_OWNER_ID")?.ok_or_else(|| ConfigError::MissingRequired {
        key: "DISCORD_OWNER_ID".to_string(),
        hint: "Set it to your numeric user id (enable developer mode to copy it)".to_string(),
    })?;
    raw.trim()
        .parse::<UserId>()
        .map_err(|e| ConfigError::InvalidValue {
            key: "DISCORD_OWNER_ID".to_string(),
            message: format!("must be a numeric user id: {e}"),
        })
}
