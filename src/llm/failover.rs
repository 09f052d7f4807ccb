//! Multi-provider LLM failover.
//!
//! Wraps several LlmProvider instances and tries each in priority order
//! until one succeeds. Transparent to callers: same LlmProvider trait.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::LlmError;
use crate::llm::provider::{
    LlmProvider, ProviderStatus, ToolCompletionRequest, ToolCompletionResponse,
};

/// Returns `true` if the next provider in the chain might succeed where
/// this one failed.
///
/// Auth failures are included: each provider carries its own key.
/// `ContextLengthExceeded` propagates immediately since the request itself
/// is too large.
fn is_retryable(err: &LlmError) -> bool {
    matches!(
        err,
        LlmError::RequestFailed { .. }
            | LlmError::RateLimited { .. }
            | LlmError::InvalidResponse { .. }
            | LlmError::ModelNotAvailable { .. }
            | LlmError::AuthFailed { .. }
            | LlmError::Http(_)
            | LlmError::Json(_)
    )
}

#[derive(Default)]
struct ProviderStats {
    successes: AtomicU64,
    failures: AtomicU64,
    last_error: RwLock<Option<String>>,
}

/// An LLM provider that tries each wrapped provider in sequence.
///
/// Each provider runs its own retry budget before the chain moves on.
/// When every provider fails, the chain raises
/// [`LlmError::AllProvidersExhausted`].
pub struct FailoverProvider {
    providers: Vec<Arc<dyn LlmProvider>>,
    stats: Vec<ProviderStats>,
    /// Index of the provider that last handled a request successfully.
    last_used: AtomicUsize,
}

impl FailoverProvider {
    /// Create a new failover provider.
    ///
    /// Returns an error if `providers` is empty.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Result<Self, LlmError> {
        if providers.is_empty() {
            return Err(LlmError::RequestFailed {
                provider: "failover".to_string(),
                reason: "FailoverProvider requires at least one provider".to_string(),
            });
        }
        let stats = providers.iter().map(|_| ProviderStats::default()).collect();
        Ok(Self {
            providers,
            stats,
            last_used: AtomicUsize::new(0),
        })
    }

    /// Try each provider in sequence until one succeeds or all fail.
    async fn try_providers<T, F, Fut>(&self, mut call: F) -> Result<T, LlmError>
    where
        F: FnMut(Arc<dyn LlmProvider>) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut last_error: Option<LlmError> = None;

        for (i, provider) in self.providers.iter().enumerate() {
            let stats = &self.stats[i];
            match call(Arc::clone(provider)).await {
                Ok(response) => {
                    self.last_used.store(i, Ordering::Relaxed);
                    stats.successes.fetch_add(1, Ordering::Relaxed);
                    *stats.last_error.write().await = None;
                    return Ok(response);
                }
                Err(err) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    *stats.last_error.write().await = Some(err.to_string());

                    if !is_retryable(&err) {
                        return Err(err);
                    }
                    if let Some(next) = self.providers.get(i + 1) {
                        tracing::warn!(
                            provider = %provider.provider_name(),
                            error = %err,
                            next_provider = %next.provider_name(),
                            "Provider failed, trying next provider"
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
        tracing::error!(
            attempts = self.providers.len(),
            error = %last_error,
            "All LLM providers failed"
        );
        Err(LlmError::AllProvidersExhausted {
            attempts: self.providers.len(),
            last_error,
        })
    }
}

#[async_trait]
impl LlmProvider for FailoverProvider {
    fn provider_name(&self) -> &str {
        self.providers[self.last_used.load(Ordering::Relaxed)].provider_name()
    }

    fn model_name(&self) -> &str {
        self.providers[self.last_used.load(Ordering::Relaxed)].model_name()
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        self.try_providers(|provider| {
            let req = request.clone();
            async move { provider.complete_with_tools(req).await }
        })
        .await
    }

    async fn status(&self) -> Vec<ProviderStatus> {
        let mut out = Vec::with_capacity(self.providers.len());
        for (provider, stats) in self.providers.iter().zip(&self.stats) {
            out.push(ProviderStatus {
                provider: provider.provider_name().to_string(),
                model: provider.model_name().to_string(),
                successes: stats.successes.load(Ordering::Relaxed),
                failures: stats.failures.load(Ordering::Relaxed),
                last_error: stats.last_error.read().await.clone(),
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::llm::provider::FinishReason;
    use crate::testing::StubLlm;

    fn make_request() -> ToolCompletionRequest {
        ToolCompletionRequest::new(vec![crate::llm::ChatMessage::user("hello")], vec![])
    }

    fn ok_response(text: &str) -> Result<ToolCompletionResponse, LlmError> {
        Ok(ToolCompletionResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            finish_reason: FinishReason::Stop,
            input_tokens: 10,
            output_tokens: 5,
            provider: String::new(),
            model: String::new(),
        })
    }

    fn request_failed(name: &str) -> LlmError {
        LlmError::RequestFailed {
            provider: name.to_string(),
            reason: "server error".to_string(),
        }
    }

    #[tokio::test]
    async fn primary_succeeds_no_failover() {
        let primary = Arc::new(StubLlm::named("primary", "primary response"));
        let fallback = Arc::new(StubLlm::named("fallback", "fallback response"));

        let failover = FailoverProvider::new(vec![primary, fallback.clone()]).unwrap();

        let response = failover.complete_with_tools(make_request()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("primary response"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn primary_fails_retryable_fallback_succeeds() {
        let primary = Arc::new(StubLlm::named("primary", "unused"));
        primary.push_response(Err(request_failed("primary")));
        let fallback = Arc::new(StubLlm::named("fallback", "fallback response"));

        let failover = FailoverProvider::new(vec![primary, fallback]).unwrap();

        let response = failover.complete_with_tools(make_request()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("fallback response"));
        assert_eq!(response.provider, "fallback");
    }

    #[tokio::test]
    async fn all_providers_fail_reports_exhaustion() {
        let primary = Arc::new(StubLlm::named("primary", "unused"));
        primary.push_response(Err(request_failed("primary")));
        let fallback = Arc::new(StubLlm::named("fallback", "unused"));
        fallback.push_response(Err(LlmError::RateLimited {
            provider: "fallback".to_string(),
            retry_after: Some(Duration::from_secs(30)),
        }));

        let failover = FailoverProvider::new(vec![primary, fallback]).unwrap();

        let err = failover.complete_with_tools(make_request()).await.unwrap_err();
        match err {
            LlmError::AllProvidersExhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("fallback"));
            }
            other => panic!("expected AllProvidersExhausted, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_failure_moves_to_next_provider() {
        let primary = Arc::new(StubLlm::named("primary", "unused"));
        primary.push_response(Err(LlmError::AuthFailed {
            provider: "primary".to_string(),
        }));
        let fallback = Arc::new(StubLlm::named("fallback", "fallback response"));

        let failover = FailoverProvider::new(vec![primary, fallback]).unwrap();

        let response = failover.complete_with_tools(make_request()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("fallback response"));
    }

    #[tokio::test]
    async fn context_length_error_fails_immediately() {
        let primary = Arc::new(StubLlm::named("primary", "unused"));
        primary.push_response(Err(LlmError::ContextLengthExceeded {
            used: 100_000,
            limit: 50_000,
        }));
        let fallback = Arc::new(StubLlm::named("fallback", "fallback response"));

        let failover = FailoverProvider::new(vec![primary, fallback.clone()]).unwrap();

        let err = failover.complete_with_tools(make_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::ContextLengthExceeded { .. }));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn three_providers_first_two_fail_third_succeeds() {
        let p1 = Arc::new(StubLlm::named("provider-1", "unused"));
        p1.push_response(Err(request_failed("provider-1")));
        let p2 = Arc::new(StubLlm::named("provider-2", "unused"));
        p2.push_response(Err(LlmError::RateLimited {
            provider: "provider-2".to_string(),
            retry_after: None,
        }));
        let p3 = Arc::new(StubLlm::named("provider-3", "unused"));
        p3.push_response(ok_response("third time lucky"));

        let failover = FailoverProvider::new(vec![p1, p2, p3]).unwrap();

        let response = failover.complete_with_tools(make_request()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("third time lucky"));
    }

    #[tokio::test]
    async fn status_tracks_failures_and_last_used() {
        let primary = Arc::new(StubLlm::named("primary", "unused"));
        primary.push_response(Err(request_failed("primary")));
        let fallback = Arc::new(StubLlm::named("fallback", "ok"));

        let failover = FailoverProvider::new(vec![primary, fallback]).unwrap();
        assert_eq!(failover.provider_name(), "primary");

        failover.complete_with_tools(make_request()).await.unwrap();
        assert_eq!(failover.provider_name(), "fallback");

        let status = failover.status().await;
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].failures, 1);
        assert!(!status[0].is_healthy());
        assert_eq!(status[1].successes, 1);
        assert!(status[1].is_healthy());
    }

    #[test]
    fn retryable_classification() {
        assert!(is_retryable(&request_failed("p")));
        assert!(is_retryable(&LlmError::RateLimited {
            provider: "p".into(),
            retry_after: None,
        }));
        assert!(is_retryable(&LlmError::InvalidResponse {
            provider: "p".into(),
            reason: "bad json".into(),
        }));
        assert!(is_retryable(&LlmError::AuthFailed {
            provider: "p".into(),
        }));
        assert!(is_retryable(&LlmError::ModelNotAvailable {
            provider: "p".into(),
            model: "m".into(),
        }));

        assert!(!is_retryable(&LlmError::ContextLengthExceeded {
            used: 100_000,
            limit: 50_000,
        }));
        assert!(!is_retryable(&LlmError::AllProvidersExhausted {
            attempts: 3,
            last_error: "x".into(),
        }));
    }

    #[test]
    fn empty_providers_returns_error() {
        assert!(FailoverProvider::new(vec![]).is_err());
    }
}
