//! Test doubles for the dispatcher's collaborators.
//!
//! Provides:
//! - [`StubLlm`]: a provider returning scripted responses or a fixed text
//! - [`RecordingPlatform`]: a platform that records every call and can be
//!   told to fail specific ones
//! - [`ScriptedSurface`]: a notification surface with an inspectable
//!   publish/edit log and injectable reactions and replies
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden::testing::{RecordingPlatform, ScriptedSurface, StubLlm};
//!
//! # async fn demo() {
//! let llm = Arc::new(StubLlm::named("stub", "hello"));
//! let platform = Arc::new(RecordingPlatform::new());
//! let surface = Arc::new(ScriptedSurface::new());
//! surface.queue_reply(900, "yes");
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::confirm::{
    EventStream, MessageHandle, NotificationSurface, ReactionEvent, ReplyEvent,
};
use crate::error::{LlmError, PlatformError};
use crate::llm::{
    FinishReason, LlmProvider, ToolCall, ToolCompletionRequest, ToolCompletionResponse,
};
use crate::ops::Arguments;
use crate::platform::{CategoryRef, ChannelId, ChannelRef, GuildId, Platform, UserId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A configurable LLM provider stub.
///
/// Scripted responses pushed with [`push_response`](Self::push_response)
/// are returned first, in order. Once they run out the stub answers with
/// its default text, or a transient error while
/// [`set_failing`](Self::set_failing) is on.
pub struct StubLlm {
    name: String,
    response: String,
    scripted: Mutex<VecDeque<Result<ToolCompletionResponse, LlmError>>>,
    requests: Mutex<Vec<ToolCompletionRequest>>,
    call_count: AtomicU32,
    should_fail: AtomicBool,
}

impl StubLlm {
    pub fn new(response: impl Into<String>) -> Self {
        Self::named("stub-model", response)
    }

    /// Stub whose provider and model are both `name`.
    pub fn named(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: response.into(),
            scripted: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
        }
    }

    /// Stub that always fails with a transient error.
    pub fn failing(name: impl Into<String>) -> Self {
        let stub = Self::named(name, "");
        stub.set_failing(true);
        stub
    }

    pub fn push_response(&self, response: Result<ToolCompletionResponse, LlmError>) {
        lock(&self.scripted).push_back(response);
    }

    /// Script a response carrying one tool call.
    pub fn push_tool_call(&self, operation: &str, arguments: Value) {
        self.push_tool_calls(vec![(operation, arguments)]);
    }

    /// Script a response carrying several tool calls, in order.
    pub fn push_tool_calls(&self, calls: Vec<(&str, Value)>) {
        let tool_calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{i}"),
                name: name.to_string(),
                arguments,
            })
            .collect();
        self.push_response(Ok(ToolCompletionResponse {
            content: None,
            tool_calls,
            finish_reason: FinishReason::ToolUse,
            input_tokens: 10,
            output_tokens: 5,
            provider: self.name.clone(),
            model: self.name.clone(),
        }));
    }

    /// Script a plain text answer.
    pub fn push_text(&self, text: &str) {
        self.push_response(Ok(self.text_response(text)));
    }

    /// Number of `complete_with_tools` calls so far.
    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn set_failing(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ToolCompletionRequest> {
        lock(&self.requests).clone()
    }

    fn text_response(&self, text: &str) -> ToolCompletionResponse {
        ToolCompletionResponse {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            input_tokens: 10,
            output_tokens: 5,
            provider: self.name.clone(),
            model: self.name.clone(),
        }
    }
}

impl Default for StubLlm {
    fn default() -> Self {
        Self::new("OK")
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        lock(&self.requests).push(request);

        let scripted = lock(&self.scripted).pop_front();
        match scripted {
            Some(Ok(mut response)) => {
                if response.provider.is_empty() {
                    response.provider = self.name.clone();
                }
                if response.model.is_empty() {
                    response.model = self.name.clone();
                }
                Ok(response)
            }
            Some(Err(e)) => Err(e),
            None if self.should_fail.load(Ordering::Relaxed) => Err(LlmError::RequestFailed {
                provider: self.name.clone(),
                reason: "server error".to_string(),
            }),
            None => Ok(self.text_response(&self.response)),
        }
    }
}

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: String,
    pub arguments: Arguments,
}

impl RecordedCall {
    /// String argument, or "" when absent.
    pub fn arg(&self, key: &str) -> &str {
        self.arguments.get(key).and_then(Value::as_str).unwrap_or("")
    }
}

struct ScriptedFailure {
    operation: String,
    key: String,
    value: String,
}

/// A platform that succeeds at everything unless told otherwise.
///
/// `delete_channel_by_id` is recorded as operation `delete_channel_by_id`
/// with a `channel_id` argument.
#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<Vec<ScriptedFailure>>,
    categories: Mutex<Vec<CategoryRef>>,
    failing_ids: Mutex<Vec<ChannelId>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `operation` whenever its argument `key` equals `value`.
    pub fn fail_when(&self, operation: &str, key: &str, value: &str) {
        lock(&self.failures).push(ScriptedFailure {
            operation: operation.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Make a category visible to `find_category`. Channel ids are assigned
    /// from `first_id` upwards; the category itself gets `first_id - 1`.
    pub fn add_category(&self, name: &str, first_id: ChannelId, channels: &[&str]) {
        let channels = channels
            .iter()
            .enumerate()
            .map(|(i, c)| ChannelRef {
                id: first_id + i as ChannelId,
                name: c.to_string(),
            })
            .collect();
        lock(&self.categories).push(CategoryRef {
            id: first_id.saturating_sub(1),
            name: name.to_string(),
            channels,
        });
    }

    /// Make `delete_channel_by_id` fail for `channel_id`.
    pub fn fail_delete_id(&self, channel_id: ChannelId) {
        lock(&self.failing_ids).push(channel_id);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn record(&self, operation: &str, arguments: Arguments) {
        lock(&self.calls).push(RecordedCall {
            operation: operation.to_string(),
            arguments,
        });
    }

    fn scripted_failure(&self, operation: &str, arguments: &Arguments) -> Option<PlatformError> {
        lock(&self.failures).iter().find_map(|f| {
            let hit = f.operation == operation
                && arguments.get(&f.key).is_some_and(|v| match v {
                    Value::String(s) => s == &f.value,
                    other => other.to_string() == f.value,
                });
            hit.then(|| PlatformError::Forbidden {
                action: format!("{operation} {}", f.value),
            })
        })
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn invoke(&self, operation: &str, arguments: &Arguments) -> Result<String, PlatformError> {
        self.record(operation, arguments.clone());
        match self.scripted_failure(operation, arguments) {
            Some(err) => Err(err),
            None => Ok(format!("ok: {operation}")),
        }
    }

    async fn find_category(
        &self,
        _guild_id: GuildId,
        name: &str,
    ) -> Result<CategoryRef, PlatformError> {
        lock(&self.categories)
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| PlatformError::not_found("Category", name))
    }

    async fn delete_channel_by_id(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), PlatformError> {
        let mut arguments = Arguments::new();
        arguments.insert("channel_id".into(), Value::from(channel_id));
        self.record("delete_channel_by_id", arguments);
        if lock(&self.failing_ids).contains(&channel_id) {
            return Err(PlatformError::Forbidden {
                action: format!("delete channel {channel_id}"),
            });
        }
        Ok(())
    }

    async fn guild_name(&self, guild_id: GuildId) -> Result<String, PlatformError> {
        Ok(format!("Guild {guild_id}"))
    }
}

#[derive(Default)]
struct SurfaceState {
    next_id: u64,
    published: Vec<(MessageHandle, String)>,
    edits: Vec<(MessageHandle, String)>,
    markers: Vec<(MessageHandle, Vec<String>)>,
    reaction_tx: HashMap<MessageHandle, mpsc::UnboundedSender<ReactionEvent>>,
    reaction_rx: HashMap<MessageHandle, mpsc::UnboundedReceiver<ReactionEvent>>,
    reply_tx: HashMap<MessageHandle, mpsc::UnboundedSender<ReplyEvent>>,
    reply_rx: HashMap<MessageHandle, mpsc::UnboundedReceiver<ReplyEvent>>,
    queued_replies: VecDeque<(UserId, String)>,
}

/// Notification surface driven by the test.
///
/// Each published message gets its own buffered reaction and reply
/// channels, so events injected before a listener subscribes are still
/// delivered.
pub struct ScriptedSurface {
    state: Mutex<SurfaceState>,
    notices_tx: mpsc::UnboundedSender<MessageHandle>,
    notices_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MessageHandle>>,
    fail_publish: AtomicBool,
    fail_markers: AtomicBool,
    fail_edits: AtomicBool,
    marker_delay: Mutex<Option<Duration>>,
}

impl Default for ScriptedSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSurface {
    pub fn new() -> Self {
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(SurfaceState::default()),
            notices_tx,
            notices_rx: tokio::sync::Mutex::new(notices_rx),
            fail_publish: AtomicBool::new(false),
            fail_markers: AtomicBool::new(false),
            fail_edits: AtomicBool::new(false),
            marker_delay: Mutex::new(None),
        }
    }

    pub fn fail_publish(&self) {
        self.fail_publish.store(true, Ordering::Relaxed);
    }

    pub fn fail_markers(&self) {
        self.fail_markers.store(true, Ordering::Relaxed);
    }

    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::Relaxed);
    }

    /// Make `add_markers` take `delay` before returning.
    pub fn slow_markers(&self, delay: Duration) {
        *lock(&self.marker_delay) = Some(delay);
    }

    /// Answer the next published notice with a reply from `user_id`.
    pub fn queue_reply(&self, user_id: UserId, content: &str) {
        lock(&self.state)
            .queued_replies
            .push_back((user_id, content.to_string()));
    }

    /// Wait for the next published notice.
    pub async fn next_notice(&self) -> MessageHandle {
        self.notices_rx
            .lock()
            .await
            .recv()
            .await
            .expect("surface owns the notice sender")
    }

    pub fn react(&self, handle: &MessageHandle, user_id: UserId, is_bot: bool, symbol: &str) {
        if let Some(tx) = lock(&self.state).reaction_tx.get(handle) {
            let _ = tx.send(ReactionEvent {
                user_id,
                is_bot,
                symbol: symbol.to_string(),
            });
        }
    }

    pub fn reply(&self, handle: &MessageHandle, user_id: UserId, is_bot: bool, content: &str) {
        if let Some(tx) = lock(&self.state).reply_tx.get(handle) {
            let _ = tx.send(ReplyEvent {
                user_id,
                is_bot,
                content: content.to_string(),
            });
        }
    }

    pub fn published(&self) -> Vec<(MessageHandle, String)> {
        lock(&self.state).published.clone()
    }

    pub fn edits(&self) -> Vec<(MessageHandle, String)> {
        lock(&self.state).edits.clone()
    }

    pub fn markers(&self) -> Vec<(MessageHandle, Vec<String>)> {
        lock(&self.state).markers.clone()
    }
}

#[async_trait]
impl NotificationSurface for ScriptedSurface {
    fn surface_id(&self) -> String {
        "scripted".to_string()
    }

    async fn publish(&self, content: &str) -> Result<MessageHandle, PlatformError> {
        if self.fail_publish.load(Ordering::Relaxed) {
            return Err(PlatformError::Unavailable {
                reason: "publish disabled".to_string(),
            });
        }
        let handle = {
            let mut state = lock(&self.state);
            state.next_id += 1;
            let handle = MessageHandle(format!("msg-{}", state.next_id));
            state.published.push((handle.clone(), content.to_string()));

            let (reaction_tx, reaction_rx) = mpsc::unbounded_channel();
            let (reply_tx, reply_rx) = mpsc::unbounded_channel();
            if let Some((user_id, content)) = state.queued_replies.pop_front() {
                let _ = reply_tx.send(ReplyEvent {
                    user_id,
                    is_bot: false,
                    content,
                });
            }
            state.reaction_tx.insert(handle.clone(), reaction_tx);
            state.reaction_rx.insert(handle.clone(), reaction_rx);
            state.reply_tx.insert(handle.clone(), reply_tx);
            state.reply_rx.insert(handle.clone(), reply_rx);
            handle
        };
        let _ = self.notices_tx.send(handle.clone());
        Ok(handle)
    }

    async fn edit(&self, handle: &MessageHandle, content: &str) -> Result<(), PlatformError> {
        if self.fail_edits.load(Ordering::Relaxed) {
            return Err(PlatformError::not_found("Message", handle.0.clone()));
        }
        lock(&self.state)
            .edits
            .push((handle.clone(), content.to_string()));
        Ok(())
    }

    async fn add_markers(
        &self,
        handle: &MessageHandle,
        markers: &[&str],
    ) -> Result<(), PlatformError> {
        let delay = *lock(&self.marker_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_markers.load(Ordering::Relaxed) {
            return Err(PlatformError::Forbidden {
                action: "add reactions".to_string(),
            });
        }
        lock(&self.state).markers.push((
            handle.clone(),
            markers.iter().map(|m| m.to_string()).collect(),
        ));
        Ok(())
    }

    async fn reactions(
        &self,
        handle: &MessageHandle,
    ) -> Result<EventStream<ReactionEvent>, PlatformError> {
        let rx = lock(&self.state)
            .reaction_rx
            .remove(handle)
            .ok_or_else(|| PlatformError::not_found("Message", handle.0.clone()))?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn replies(
        &self,
        handle: &MessageHandle,
    ) -> Result<EventStream<ReplyEvent>, PlatformError> {
        let rx = lock(&self.state)
            .reply_rx
            .remove(handle)
            .ok_or_else(|| PlatformError::not_found("Message", handle.0.clone()))?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}
