use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{first_env, parse_optional_env, parse_string_env};
use crate::error::ConfigError;

/// One OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Short provider id shown in status output ("openrouter", "google", ...).
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
    /// Env var the key was read from, for diagnostics.
    pub api_key_env: String,
    pub max_retries: u32,
    pub timeout: Duration,
}

/// LLM provider chain configuration.
///
/// Providers appear in fixed priority order; those without a key are skipped.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub providers: Vec<ProviderConfig>,
}

struct ProviderSeed {
    name: &'static str,
    key_vars: &'static [&'static str],
    base_url_var: &'static str,
    default_base_url: &'static str,
    model_var: &'static str,
    default_model: &'static str,
}

const PROVIDER_SEEDS: &[ProviderSeed] = &[
    ProviderSeed {
        name: "openrouter",
        key_vars: &["OPENROUTER_API_KEY", "OPENAI_API_KEY"],
        base_url_var: "OPENROUTER_BASE_URL",
        default_base_url: "https://openrouter.ai/api/v1",
        model_var: "OPENROUTER_MODEL",
        default_model: "deepseek/deepseek-chat-v3-0324:free",
    },
    ProviderSeed {
        name: "google",
        key_vars: &["GOOGLE_AI_KEY", "GEMINI_API_KEY"],
        base_url_var: "GOOGLE_AI_BASE_URL",
        default_base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        model_var: "GOOGLE_AI_MODEL",
        default_model: "gemini-1.5-flash",
    },
    ProviderSeed {
        name: "cerebras",
        key_vars: &["CEREBRAS_API_KEY"],
        base_url_var: "CEREBRAS_BASE_URL",
        default_base_url: "https://api.cerebras.ai/v1",
        model_var: "CEREBRAS_MODEL",
        default_model: "llama-3.3-70b",
    },
];

impl LlmConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let max_retries: u32 = parse_optional_env("WARDEN_LLM_MAX_RETRIES", 2)?;
        let timeout_secs: u64 = parse_optional_env("WARDEN_LLM_TIMEOUT_SECS", 60)?;

        let mut providers = Vec::new();
        for seed in PROVIDER_SEEDS {
            let Some((key_var, key)) = first_env(seed.key_vars)? else {
                tracing::debug!(provider = seed.name, "No API key configured, skipping provider");
                continue;
            };
            providers.push(ProviderConfig {
                name: seed.name.to_string(),
                base_url: parse_string_env(seed.base_url_var, seed.default_base_url)?
                    .trim_end_matches('/')
                    .to_string(),
                model: parse_string_env(seed.model_var, seed.default_model)?,
                api_key: SecretString::from(key),
                api_key_env: key_var,
                max_retries,
                timeout: Duration::from_secs(timeout_secs),
            });
        }

        Ok(Self { providers })
    }

    /// Fail unless at least one provider has a key.
    pub fn require_any(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "OPENROUTER_API_KEY".to_string(),
                hint: "Set at least one of OPENROUTER_API_KEY, GOOGLE_AI_KEY or CEREBRAS_API_KEY"
                    .to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::helpers::ENV_MUTEX;

    const ALL_KEYS: &[&str] = &[
        "OPENROUTER_API_KEY",
        "OPENAI_API_KEY",
        "GOOGLE_AI_KEY",
        "GEMINI_API_KEY",
        "CEREBRAS_API_KEY",
        "OPENROUTER_MODEL",
        "WARDEN_LLM_MAX_RETRIES",
    ];

    fn clear_keys() {
        for key in ALL_KEYS {
            // SAFETY: callers hold ENV_MUTEX.
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn providers_keep_priority_order_and_skip_missing_keys() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_keys();
        // SAFETY: ENV_MUTEX held.
        unsafe {
            std::env::set_var("CEREBRAS_API_KEY", "c-key");
            std::env::set_var("OPENAI_API_KEY", "o-key");
        }

        let config = LlmConfig::resolve().unwrap();
        let names: Vec<&str> = config.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["openrouter", "cerebras"]);
        assert_eq!(config.providers[0].api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.providers[0].max_retries, 2);

        clear_keys();
    }

    #[test]
    fn no_keys_fails_require_any() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_keys();

        let config = LlmConfig::resolve().unwrap();
        assert!(config.providers.is_empty());
        assert!(matches!(
            config.require_any(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn invalid_retry_count_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_keys();
        // SAFETY: ENV_MUTEX held.
        unsafe { std::env::set_var("WARDEN_LLM_MAX_RETRIES", "lots") };

        let err = LlmConfig::resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "WARDEN_LLM_MAX_RETRIES"));

        clear_keys();
    }
}
