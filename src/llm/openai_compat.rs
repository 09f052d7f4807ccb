//! OpenAI-compatible Chat Completions provider.
//!
//! OpenRouter, Google AI (OpenAI endpoint) and Cerebras all speak this
//! protocol, so one client covers every configured provider.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, FinishReason, LlmProvider, Role, ToolCall, ToolCompletionRequest,
    ToolCompletionResponse,
};
use crate::llm::retry::{Backoff, StatusClass, classify_status, parse_retry_after};

/// Chat completions client for one provider endpoint.
pub struct OpenAiCompatProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiCompatProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        if config.api_key.expose_secret().is_empty() {
            return Err(LlmError::AuthFailed {
                provider: config.name.clone(),
            });
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    /// Send a request with retry on transient errors.
    ///
    /// Retries on HTTP 429, 5xx gateway statuses and connection errors, up
    /// to `max_retries` extra attempts. A `Retry-After` hint on 429 replaces
    /// the backoff delay.
    async fn send_request<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        body: &T,
    ) -> Result<R, LlmError> {
        let url = self.api_url("chat/completions");
        let provider = self.config.name.as_str();
        let max_retries = self.config.max_retries;
        let backoff = Backoff::default();
        let mut attempt = 0;

        loop {
            tracing::debug!(provider, attempt = attempt + 1, "Sending chat completion request");

            if tracing::enabled!(tracing::Level::DEBUG)
                && let Ok(json) = serde_json::to_string(body)
            {
                tracing::debug!(provider, body = %json, "Chat completion request body");
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(self.config.api_key.expose_secret())
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    if attempt < max_retries {
                        let delay = backoff.delay(attempt);
                        tracing::warn!(
                            provider,
                            attempt = attempt + 1,
                            ?delay,
                            error = %e,
                            "Chat completion request error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(LlmError::RequestFailed {
                        provider: provider.to_string(),
                        reason: e.to_string(),
                    });
                }
            };

            let status = response.status();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let response_text = response.text().await.unwrap_or_default();
            tracing::debug!(provider, %status, "Chat completion response received");

            if !status.is_success() {
                let status_code = status.as_u16();
                let class = classify_status(status_code);

                if matches!(class, StatusClass::Transient | StatusClass::RateLimited)
                    && attempt < max_retries
                {
                    let delay = backoff.delay_with_hint(attempt, retry_after);
                    tracing::warn!(
                        provider,
                        status = status_code,
                        attempt = attempt + 1,
                        ?delay,
                        "Chat completion returned transient status, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                return Err(match class {
                    StatusClass::Auth => LlmError::AuthFailed {
                        provider: provider.to_string(),
                    },
                    StatusClass::RateLimited => LlmError::RateLimited {
                        provider: provider.to_string(),
                        retry_after,
                    },
                    StatusClass::ModelMissing => LlmError::ModelNotAvailable {
                        provider: provider.to_string(),
                        model: self.config.model.clone(),
                    },
                    StatusClass::Transient | StatusClass::Fatal => LlmError::RequestFailed {
                        provider: provider.to_string(),
                        reason: format!("HTTP {}: {}", status, response_text),
                    },
                });
            }

            return serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidResponse {
                provider: provider.to_string(),
                reason: format!("JSON parse error: {}. Raw: {}", e, response_text),
            });
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        &self.config.name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete_with_tools(
        &self,
        req: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let messages: Vec<ChatCompletionMessage> =
            req.messages.into_iter().map(|m| m.into()).collect();

        let tools: Vec<ChatCompletionTool> = req
            .tools
            .into_iter()
            .map(|t| ChatCompletionTool {
                tool_type: "function".to_string(),
                function: ChatCompletionFunction {
                    name: t.name,
                    description: Some(t.description),
                    parameters: Some(t.parameters),
                },
            })
            .collect();

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            tool_choice: if tools.is_empty() { None } else { req.tool_choice },
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        let response: ChatCompletionResponse = self.send_request(&request).await?;

        let choice =
            response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| LlmError::InvalidResponse {
                    provider: self.config.name.clone(),
                    reason: "No choices in response".to_string(),
                })?;

        let content = choice.message.content.filter(|c| !c.trim().is_empty());
        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Object(Default::default()));
                ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();

        let finish_reason = parse_finish_reason(choice.finish_reason.as_deref(), &tool_calls);
        let usage = response.usage.unwrap_or_default();

        Ok(ToolCompletionResponse {
            content,
            tool_calls,
            finish_reason,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            provider: self.config.name.clone(),
            model: self.config.model.clone(),
        })
    }
}

fn parse_finish_reason(raw: Option<&str>, tool_calls: &[ToolCall]) -> FinishReason {
    match raw {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolUse,
        Some("content_filter") => FinishReason::ContentFilter,
        _ if !tool_calls.is_empty() => FinishReason::ToolUse,
        _ => FinishReason::Unknown,
    }
}

// OpenAI-compatible Chat Completions API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatCompletionTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatCompletionToolCall>>,
}

impl From<ChatMessage> for ChatCompletionMessage {
    fn from(msg: ChatMessage) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let tool_calls = msg.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| ChatCompletionToolCall {
                    id: tc.id,
                    call_type: "function".to_string(),
                    function: ChatCompletionToolCallFunction {
                        name: tc.name,
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect()
        });

        let content = if role == "assistant" && tool_calls.is_some() && msg.content.is_empty() {
            None
        } else {
            Some(msg.content)
        };

        Self {
            role: role.to_string(),
            content,
            tool_call_id: msg.tool_call_id,
            name: msg.name,
            tool_calls,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ChatCompletionFunction,
}

#[derive(Debug, Serialize)]
struct ChatCompletionFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatCompletionToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionToolCall {
    id: String,
    #[serde(rename = "type", default = "default_call_type")]
    call_type: String,
    function: ChatCompletionToolCallFunction,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_conversion() {
        let msg = ChatMessage::user("Hello");
        let chat_msg: ChatCompletionMessage = msg.into();
        assert_eq!(chat_msg.role, "user");
        assert_eq!(chat_msg.content, Some("Hello".to_string()));
    }

    #[test]
    fn test_tool_result_conversion() {
        let msg = ChatMessage::tool_result("call_123", "delete_channel", "done");
        let chat_msg: ChatCompletionMessage = msg.into();
        assert_eq!(chat_msg.role, "tool");
        assert_eq!(chat_msg.tool_call_id, Some("call_123".to_string()));
        assert_eq!(chat_msg.name, Some("delete_channel".to_string()));
    }

    #[test]
    fn test_tool_call_arguments_serialized_to_string() {
        let tc = ToolCall {
            id: "call_1".to_string(),
            name: "create_channel".to_string(),
            arguments: serde_json::json!({"name": "general"}),
        };
        let msg = ChatMessage::assistant_with_tool_calls(None, vec![tc]);
        let chat_msg: ChatCompletionMessage = msg.into();

        assert!(chat_msg.content.is_none());
        let calls = chat_msg.tool_calls.unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&calls[0].function.arguments).expect("valid JSON string");
        assert_eq!(parsed["name"], "general");
    }

    #[test]
    fn test_response_with_tool_calls_parses() {
        let raw = r#"{
            "id": "gen-1",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "list_roles", "arguments": "{\"guild_id\": 42}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(response.usage.is_none());
        let calls = response.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "list_roles");
    }

    #[test]
    fn test_finish_reason_falls_back_to_tool_use() {
        let calls = vec![ToolCall {
            id: "1".into(),
            name: "x".into(),
            arguments: serde_json::json!({}),
        }];
        assert_eq!(parse_finish_reason(None, &calls), FinishReason::ToolUse);
        assert_eq!(parse_finish_reason(None, &[]), FinishReason::Unknown);
        assert_eq!(parse_finish_reason(Some("stop"), &calls), FinishReason::Stop);
    }
}
