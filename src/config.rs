//! Configuration for Warden.
//!
//! Everything comes from environment variables. A `.env` file in the
//! working directory is loaded first via dotenvy, which never overwrites
//! variables that are already set.

mod bot;
mod dispatch;
pub(crate) mod helpers;
mod llm;

pub use self::bot::{BotConfig, DEFAULT_LEGACY_PREFIX, resolve_owner_id};
pub use self::dispatch::DispatchConfig;
pub use self::llm::{LlmConfig, ProviderConfig};

use crate::error::ConfigError;

/// Main configuration for the bot.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot: BotConfig,
    pub llm: LlmConfig,
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Load the full configuration, failing on missing credentials.
    ///
    /// This is the only fatal check in the process and runs once before
    /// any event loop starts.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            bot: BotConfig::resolve()?,
            llm: LlmConfig::resolve()?,
            dispatch: DispatchConfig::resolve()?,
        };
        config.llm.require_any()?;
        Ok(config)
    }
}

/// Settings for the local sandbox, which needs no platform token and
/// runs without providers when none are configured.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub llm: LlmConfig,
    pub dispatch: DispatchConfig,
}

impl SandboxConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(Self {
            llm: LlmConfig::resolve()?,
            dispatch: DispatchConfig::resolve()?,
        })
    }
}
