//! Remote language-model integration.
//!
//! Every provider speaks the OpenAI chat completions protocol. Providers are
//! chained in priority order behind a [`FailoverProvider`], which raises
//! `AllProvidersExhausted` only after each one has spent its retry budget.

pub mod failover;
mod openai_compat;
mod provider;
mod retry;

pub use failover::FailoverProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{
    ChatMessage, FinishReason, LlmProvider, ProviderStatus, Role, ToolCall, ToolCompletionRequest,
    ToolCompletionResponse, ToolDefinition,
};

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Build the failover chain from configuration.
pub fn create_provider_chain(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::with_capacity(config.providers.len());
    for provider in &config.providers {
        tracing::info!(
            provider = %provider.name,
            model = %provider.model,
            key_env = %provider.api_key_env,
            "Registering LLM provider"
        );
        providers.push(Arc::new(OpenAiCompatProvider::new(provider.clone())?));
    }
    Ok(Arc::new(FailoverProvider::new(providers)?))
}

/// Strip vendor prefixes and tier suffixes from a model id for display.
///
/// `deepseek/deepseek-chat-v3-0324:free` becomes `deepseek-chat-v3-0324`.
pub fn display_model_name(model: &str) -> &str {
    let name = model.rsplit('/').next().unwrap_or(model);
    name.split(':').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_prefix_and_tier() {
        assert_eq!(
            display_model_name("deepseek/deepseek-chat-v3-0324:free"),
            "deepseek-chat-v3-0324"
        );
        assert_eq!(display_model_name("gemini-1.5-flash"), "gemini-1.5-flash");
    }
}
