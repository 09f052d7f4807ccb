//! Error types for Warden.

use std::time::Duration;

/// Top-level error type for the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Errors raised by the chat platform collaborator.
///
/// None of these are fatal: the dispatcher renders each one as a
/// user-visible line and keeps serving requests.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("{entity} '{name}' not found")]
    NotFound { entity: String, name: String },

    #[error("Missing permission to {action}")]
    Forbidden { action: String },

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Platform unavailable: {reason}")]
    Unavailable { reason: String },
}

impl PlatformError {
    pub fn not_found(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            name: name.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Context length exceeded: {used} tokens used, {limit} allowed")]
    ContextLengthExceeded { used: usize, limit: usize },

    #[error("Model {model} not available on provider {provider}")]
    ModelNotAvailable { provider: String, model: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("All {attempts} providers failed, last error: {last_error}")]
    AllProvidersExhausted { attempts: usize, last_error: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors in routing a resolved invocation to a handler.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("No handler registered for operation {name}")]
    MissingHandler { name: String },

    #[error("Handler registered for {name}, which is not in the operation catalog")]
    OrphanHandler { name: String },

    #[error("Missing required parameter '{argument}' for {operation}")]
    MissingArgument { operation: String, argument: String },

    #[error("Invalid parameter '{argument}' for {operation}: {reason}")]
    InvalidArgument {
        operation: String,
        argument: String,
        reason: String,
    },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
