//! Dispatch orchestrator.
//!
//! Turns one user request into zero or more executed operations and a
//! reply text.
//!
//! ```text
//!   Request ─► context guard ─► supersede pending ─► help?
//!                                                     │
//!        tool call supplied? ──no──► model (tools) ───┤
//!              │ yes                  │ no tool call / error
//!              │                      ▼
//!              │                 intent resolver ──None──► model text / canned
//!              ▼                      │
//!        invocations (safe first) ◄───┘
//!              │
//!   per invocation: pseudo-op? ─► batch of underlying calls
//!                   lookup ─► validate ─► dangerous? ─► arbiter
//!                   handler table ─► platform / cascade / api status
//!              │
//!        join results ─► optional narration ─► model footer
//! ```

mod context;

pub use context::{
    ContextRejection, ConversationContexts, ServerFocus, explicit_server_id, guard,
    mentions_cross_server,
};

use std::sync::Arc;

use serde_json::Value;

use crate::batch::BatchReport;
use crate::config::DispatchConfig;
use crate::confirm::{
    ConfirmationArbiter, ConfirmationRequest, NotificationSurface, PendingConfirmations,
    Principal, Verdict, describe,
};
use crate::error::{DispatchError, PlatformError};
use crate::intent::{IntentResolver, PseudoOperation, ResolvedInvocation};
use crate::llm::{ChatMessage, LlmProvider, ToolCall, ToolCompletionRequest, display_model_name};
use crate::ops::{Arguments, OperationRegistry, OperationSpec, arg_str_list, arg_u64};
use crate::platform::{
    GuildId, Handler, HandlerTable, Platform, UserId, delete_category_and_channels,
    render_api_status,
};

/// Reply when no provider answered and no pattern matched.
pub const SERVICE_UNAVAILABLE: &str = "⚠️ **API Service Temporarily Unavailable**\n\
    None of the language-model providers could be reached and the request did not match \
    a known command pattern. Please try again in a few minutes, or use a direct phrasing \
    such as `create channel general` or `list roles`.";

/// Reply when no model is configured and no pattern matched.
pub const NO_MATCH: &str = "🤔 I couldn't match that to a server operation. \
    Ask `help` to see what I can do.";

const NARRATION_PROMPT: &str = "You summarise the results of server management operations \
    for the person who asked for them. Reply in two sentences at most. Do not invent results.";

/// One user request as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct Request {
    pub principal: Principal,
    pub guild_id: GuildId,
    pub guild_name: String,
    pub text: String,
}

impl Request {
    pub fn new(
        principal: Principal,
        guild_id: GuildId,
        guild_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            principal,
            guild_id,
            guild_name: guild_name.into(),
            text: text.into(),
        }
    }
}

/// What to do with a request after planning.
enum Plan {
    Execute {
        invocations: Vec<ResolvedInvocation>,
        /// Model that produced the tool calls, for the footer.
        served_by: Option<String>,
    },
    Reply(String),
}

/// Owns the registry, handler table and per-principal state, and drives
/// requests through resolution, confirmation and execution.
pub struct Dispatcher {
    registry: OperationRegistry,
    handlers: HandlerTable,
    platform: Arc<dyn Platform>,
    llm: Option<Arc<dyn LlmProvider>>,
    arbiter: ConfirmationArbiter,
    pending: Arc<PendingConfirmations>,
    contexts: ConversationContexts,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Build a dispatcher over the built-in catalog.
    ///
    /// Fails if the handler table and the registry disagree.
    pub fn new(
        platform: Arc<dyn Platform>,
        llm: Option<Arc<dyn LlmProvider>>,
        owner_id: UserId,
        bot_id: UserId,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        Self::with_tables(
            OperationRegistry::builtin(),
            HandlerTable::standard(),
            platform,
            llm,
            owner_id,
            bot_id,
            config,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_tables(
        registry: OperationRegistry,
        handlers: HandlerTable,
        platform: Arc<dyn Platform>,
        llm: Option<Arc<dyn LlmProvider>>,
        owner_id: UserId,
        bot_id: UserId,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        handlers.validate(&registry)?;
        let pending = Arc::new(PendingConfirmations::new());
        Ok(Self {
            registry,
            handlers,
            platform,
            llm,
            arbiter: ConfirmationArbiter::new(owner_id, bot_id, Arc::clone(&pending)),
            pending,
            contexts: ConversationContexts::new(),
            config,
        })
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn pending(&self) -> &Arc<PendingConfirmations> {
        &self.pending
    }

    pub fn contexts(&self) -> &ConversationContexts {
        &self.contexts
    }

    pub fn arbiter(&self) -> &ConfirmationArbiter {
        &self.arbiter
    }

    /// Handle a free-text request.
    ///
    /// `tool_call`, when given, is used as the invocation and both the
    /// model and the resolver are skipped.
    pub async fn handle(
        &self,
        request: &Request,
        surface: Arc<dyn NotificationSurface>,
        tool_call: Option<ToolCall>,
    ) -> String {
        if let Err(message) = self.begin(request).await {
            return message;
        }

        let plan = match tool_call {
            Some(call) => Plan::Execute {
                invocations: vec![ResolvedInvocation::from_tool_call(&call)],
                served_by: None,
            },
            None => {
                let resolver = IntentResolver::new(&self.registry);
                if let Some(topic) = resolver.help_topic(&request.text) {
                    return topic.text().to_string();
                }
                self.plan(request).await
            }
        };

        let (mut invocations, served_by) = match plan {
            Plan::Reply(text) => return text,
            Plan::Execute {
                invocations,
                served_by,
            } => (invocations, served_by),
        };

        // Stable: keeps model order within the safe and dangerous groups.
        invocations.sort_by_key(|inv| self.invocation_is_dangerous(&inv.operation));

        let mut results = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            results.push(
                self.execute_invocation(request, invocation, Arc::clone(&surface))
                    .await,
            );
        }
        let mut response = results.join("\n\n");

        if let Some(model) = served_by {
            if self.config.narrate_results
                && let Some(narrative) = self.narrate(request, &response).await
            {
                response = format!("{narrative}\n\n{response}");
            }
            response.push_str(&format!("\n\n_— {}_", display_model_name(&model)));
        }
        response
    }

    /// Run a pre-built invocation from a direct admin command.
    ///
    /// Skips the model and the resolver; dangerous operations still go
    /// through the arbiter.
    pub async fn run_direct(
        &self,
        request: &Request,
        invocation: ResolvedInvocation,
        surface: Arc<dyn NotificationSurface>,
    ) -> String {
        if let Err(message) = self.begin(request).await {
            return message;
        }
        self.execute_invocation(request, invocation, surface).await
    }

    /// Guard the request, then supersede the principal's open confirmation.
    async fn begin(&self, request: &Request) -> Result<(), String> {
        let principal = request.principal.user_id;
        let pending = self.pending.get(principal).await;
        let focus = self.contexts.current(principal).await;
        if let Err(rejection) = guard(
            &request.text,
            request.guild_id,
            focus.as_ref(),
            pending.as_ref(),
        ) {
            tracing::info!(
                principal,
                guild = request.guild_id,
                reason = ?rejection,
                "Request rejected by context guard"
            );
            return Err(rejection.message());
        }
        self.pending.supersede(principal).await;
        self.contexts
            .establish(principal, request.guild_id, &request.guild_name)
            .await;
        Ok(())
    }

    async fn plan(&self, request: &Request) -> Plan {
        let resolver = IntentResolver::new(&self.registry);

        let Some(llm) = &self.llm else {
            return match resolver.resolve_invocation(&request.text, request.guild_id) {
                Some(inv) => Plan::Execute {
                    invocations: vec![inv],
                    served_by: None,
                },
                None => Plan::Reply(NO_MATCH.to_string()),
            };
        };

        let completion = ToolCompletionRequest::new(
            vec![
                ChatMessage::system(system_prompt(request)),
                ChatMessage::user(request.text.clone()),
            ],
            self.registry.tool_definitions(),
        )
        .with_temperature(0.2);

        match llm.complete_with_tools(completion).await {
            Ok(response) if !response.tool_calls.is_empty() => {
                tracing::debug!(
                    provider = %response.provider,
                    calls = response.tool_calls.len(),
                    "Model returned tool calls"
                );
                Plan::Execute {
                    invocations: response
                        .tool_calls
                        .iter()
                        .map(ResolvedInvocation::from_tool_call)
                        .collect(),
                    served_by: Some(response.model),
                }
            }
            Ok(response) => {
                match resolver.resolve_invocation(&request.text, request.guild_id) {
                    Some(inv) => Plan::Execute {
                        invocations: vec![inv],
                        served_by: None,
                    },
                    None => Plan::Reply(
                        response
                            .content
                            .filter(|c| !c.trim().is_empty())
                            .unwrap_or_else(|| NO_MATCH.to_string()),
                    ),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Model request failed, falling back to pattern matching");
                match resolver.resolve_invocation(&request.text, request.guild_id) {
                    Some(inv) => Plan::Execute {
                        invocations: vec![inv],
                        served_by: None,
                    },
                    None => Plan::Reply(SERVICE_UNAVAILABLE.to_string()),
                }
            }
        }
    }

    fn invocation_is_dangerous(&self, operation: &str) -> bool {
        match PseudoOperation::parse(operation) {
            Some(pseudo) => self.registry.is_dangerous(pseudo.underlying()),
            None => self.registry.is_dangerous(operation),
        }
    }

    async fn execute_invocation(
        &self,
        request: &Request,
        mut invocation: ResolvedInvocation,
        surface: Arc<dyn NotificationSurface>,
    ) -> String {
        invocation
            .arguments
            .insert("guild_id".into(), Value::from(request.guild_id));

        if let Some(pseudo) = PseudoOperation::parse(&invocation.operation) {
            return self
                .execute_batch(request, pseudo, &invocation.arguments, surface)
                .await;
        }

        let spec = match self.registry.lookup(&invocation.operation) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(error = %e, confidence = ?invocation.confidence, "Rejected invocation");
                return self.registry.unknown_operation_help(&invocation.operation);
            }
        };

        match self
            .run_operation(request, spec, invocation.arguments, surface)
            .await
        {
            Ok(text) | Err(text) => text,
        }
    }

    /// Validate, confirm if dangerous, then execute one catalog operation.
    /// `Err` carries the user-facing reason it did not succeed.
    async fn run_operation(
        &self,
        request: &Request,
        spec: &'static OperationSpec,
        arguments: Arguments,
        surface: Arc<dyn NotificationSurface>,
    ) -> Result<String, String> {
        spec.validate_arguments(&arguments)
            .map_err(|e| format!("⚠️ {e}"))?;

        if spec.dangerous {
            let logged_arguments = Value::Object(arguments.clone());
            let decision = self
                .arbiter
                .request_confirmation(
                    ConfirmationRequest {
                        operation: spec.name.to_string(),
                        arguments: arguments.clone(),
                        principal: request.principal.clone(),
                        guild_id: request.guild_id,
                        timeout: self.config.confirm_timeout,
                    },
                    surface,
                )
                .await;

            tracing::info!(
                target: "audit",
                operation = spec.name,
                arguments = %logged_arguments,
                principal = request.principal.user_id,
                guild = request.guild_id,
                verdict = %decision.verdict,
                source = ?decision.source,
                "Dangerous operation"
            );

            match decision.verdict {
                Verdict::Confirmed => {}
                Verdict::Denied => {
                    return Err(format!(
                        "❌ Operation cancelled: {}",
                        describe(spec.name, &arguments)
                    ));
                }
                Verdict::TimedOut => {
                    return Err(format!(
                        "⏰ Confirmation timed out; `{}` was not executed.",
                        spec.name
                    ));
                }
            }
        }

        match self.execute(spec.name, &arguments).await {
            Ok(text) => {
                if spec.name == "execute_cross_server_clone"
                    && let Ok(target) = arg_u64(&arguments, "target_guild_id")
                {
                    let name = self
                        .platform
                        .guild_name(target)
                        .await
                        .unwrap_or_else(|_| target.to_string());
                    self.contexts
                        .switch(request.principal.user_id, target, name)
                        .await;
                }
                Ok(text)
            }
            Err(e) => {
                tracing::warn!(operation = spec.name, error = %e, "Operation failed");
                Err(format_platform_error(&e))
            }
        }
    }

    async fn execute(&self, operation: &str, arguments: &Arguments) -> Result<String, PlatformError> {
        let handler = self
            .handlers
            .get(operation)
            .map_err(|e| PlatformError::Unavailable {
                reason: e.to_string(),
            })?;
        match handler {
            Handler::Platform => self.platform.invoke(operation, arguments).await,
            Handler::CategoryCascade => {
                delete_category_and_channels(self.platform.as_ref(), arguments).await
            }
            Handler::ApiStatus => {
                let statuses = match &self.llm {
                    Some(llm) => llm.status().await,
                    None => Vec::new(),
                };
                Ok(render_api_status(&statuses))
            }
        }
    }

    /// Run the underlying operation once per name, continuing past
    /// failures.
    async fn execute_batch(
        &self,
        request: &Request,
        pseudo: PseudoOperation,
        arguments: &Arguments,
        surface: Arc<dyn NotificationSurface>,
    ) -> String {
        let names = match arg_str_list(arguments, "names") {
            Ok(names) if !names.is_empty() => names,
            Ok(_) => return format!("⚠️ No names given for `{}`", pseudo.name()),
            Err(e) => return format!("⚠️ {e}"),
        };
        let spec = match self.registry.lookup(pseudo.underlying()) {
            Ok(spec) => spec,
            Err(_) => return self.registry.unknown_operation_help(pseudo.underlying()),
        };

        let (title, sigil) = match pseudo {
            PseudoOperation::CreateMultipleChannels => {
                let kind = arguments
                    .get("channel_type")
                    .and_then(Value::as_str)
                    .unwrap_or("text");
                (format!("📦 Creating {} {kind} channels", names.len()), "#")
            }
            PseudoOperation::CreateMultipleRoles => {
                (format!("📦 Creating {} roles", names.len()), "@")
            }
        };
        let mut report = BatchReport::new(title);

        for name in &names {
            let label = format!("{sigil}{name}");
            let item_args = pseudo.item_arguments(arguments, name);
            match self
                .run_operation(request, spec, item_args, Arc::clone(&surface))
                .await
            {
                Ok(_) => report.succeed(label),
                Err(reason) => report.fail(label, reason),
            }
        }

        if report.is_partial_failure() {
            tracing::warn!(
                operation = pseudo.name(),
                succeeded = report.successes(),
                failed = report.failures(),
                "Batch finished with failures"
            );
        }
        report.render()
    }

    async fn narrate(&self, request: &Request, results: &str) -> Option<String> {
        let llm = self.llm.as_ref()?;
        let completion = ToolCompletionRequest::new(
            vec![
                ChatMessage::system(NARRATION_PROMPT),
                ChatMessage::user(format!(
                    "Request: {}\n\nResults:\n{}",
                    request.text, results
                )),
            ],
            Vec::new(),
        )
        .with_max_tokens(200);

        match llm.complete_with_tools(completion).await {
            Ok(response) => response.content.filter(|c| !c.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Narration failed, returning raw results");
                None
            }
        }
    }
}

fn system_prompt(request: &Request) -> String {
    format!(
        "You are Warden, a management assistant for the chat server \"{name}\" \
         (server id {id}).\n\
         Carry out requests by calling the provided tools. Do not describe what you would \
         do; call the tool.\n\
         The server id is filled in for every tool call; never ask which server.\n\
         Tools marked \"Requires confirmation\" ask the user before running; call them \
         directly and do not ask for confirmation yourself.\n\
         If the message is not a server management request, answer briefly in plain text.",
        name = request.guild_name,
        id = request.guild_id,
    )
}

/// User-facing text for a platform failure.
pub fn format_platform_error(error: &PlatformError) -> String {
    match error {
        PlatformError::NotFound { .. } => format!("❌ {error}"),
        PlatformError::Forbidden { .. } => format!("🚫 {error}"),
        PlatformError::Validation { .. } => format!("⚠️ {error}"),
        PlatformError::Unavailable { .. } => format!("❌ {error}"),
    }
}
