use std::time::Duration;

use crate::config::helpers::{parse_bool_env, parse_optional_env};
use crate::error::ConfigError;

/// Dispatcher behaviour settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How long a dangerous operation waits for a confirmation.
    pub confirm_timeout: Duration,
    /// Ask the model to wrap raw operation results in a short narrative.
    pub narrate_results: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(90),
            narrate_results: false,
        }
    }
}

impl DispatchConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let secs: u64 = parse_optional_env("WARDEN_CONFIRM_TIMEOUT_SECS", 90)?;
        if secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WARDEN_CONFIRM_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            confirm_timeout: Duration::from_secs(secs),
            narrate_results: parse_bool_env("WARDEN_NARRATE_RESULTS", false)?,
        })
    }
}
