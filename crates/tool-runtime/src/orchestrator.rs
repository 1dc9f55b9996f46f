//! One conversation turn: build context, call the model, interpret the
//! reply and run the requested tools.
//!
//! Flow: context → model → `Action:` blocks → permission → execute → tool
//! messages. Tool calls run strictly one after another in the order the
//! model wrote them; every per-call failure becomes a `tool` message and
//! the next call still runs. Only a context or model failure ends the
//! turn early, as a single assistant message.

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::context::{ContextProvider, ContextSections};
use crate::descriptor::{describe_tools, guarded_definition};
use crate::interpreter::{ActionBlockInterpreter, ResponseInterpreter};
use crate::message::{Message, ToolCall};
use crate::observer::ToolObserver;
use crate::permission::{ApprovalCallback, PermissionDecision, PermissionPolicy};
use crate::prompt::SystemPromptBuilder;
use crate::provider::{ModelBackend, ModelError};
use crate::registry::ToolRegistry;
use crate::tool::{Tool, ToolContext, ToolError};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(300);

/// Tool set and permission mode for one turn. Immutable within the turn.
#[derive(Clone)]
pub struct ToolUseContext {
    tools: Vec<Arc<dyn Tool>>,
    /// Names parallel to `tools`, captured once at construction
    names: Vec<String>,
    pub dangerous_skip_permissions: bool,
    /// Bound on each individual tool call
    pub timeout: Duration,
}

impl ToolUseContext {
    pub fn new(tools: Vec<Arc<dyn Tool>>, dangerous_skip_permissions: bool, timeout: Duration) -> Self {
        let names = tools
            .iter()
            .map(|t| guarded_definition(t.as_ref()).map(|d| d.name).unwrap_or_default())
            .collect();
        Self {
            tools,
            names,
            dangerous_skip_permissions,
            timeout,
        }
    }

    /// The registry's available tools for the given permission mode.
    pub fn from_registry(registry: &ToolRegistry, dangerous_skip_permissions: bool, timeout: Duration) -> Self {
        Self::new(
            registry.available_tools(dangerous_skip_permissions),
            dangerous_skip_permissions,
            timeout,
        )
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn tool_names(&self) -> &[String] {
        &self.names
    }

    fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.names
            .iter()
            .position(|n| !n.is_empty() && n == name)
            .map(|i| self.tools[i].clone())
    }
}

impl fmt::Debug for ToolUseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolUseContext")
            .field("tools", &self.names)
            .field("dangerous_skip_permissions", &self.dangerous_skip_permissions)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Per-turn inputs supplied by the caller.
#[derive(Default, Clone)]
pub struct TurnOptions {
    /// Replaces the context provider's sections for this turn.
    pub context: Option<ContextSections>,
    /// Defaults to the registry's available tools under the loop's skip mode.
    pub tool_use_context: Option<ToolUseContext>,
    pub can_use_tool: Option<Arc<dyn ApprovalCallback>>,
}

impl TurnOptions {
    pub fn with_context(mut self, context: ContextSections) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_tool_use_context(mut self, tool_use_context: ToolUseContext) -> Self {
        self.tool_use_context = Some(tool_use_context);
        self
    }

    pub fn with_approval(mut self, callback: Arc<dyn ApprovalCallback>) -> Self {
        self.can_use_tool = Some(callback);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    BuildingContext,
    AwaitingModel,
    HasCalls,
    ExecutingTools,
    TurnComplete,
    Error,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::BuildingContext => "building_context",
            TurnState::AwaitingModel => "awaiting_model",
            TurnState::HasCalls => "has_calls",
            TurnState::ExecutingTools => "executing_tools",
            TurnState::TurnComplete => "turn_complete",
            TurnState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Everything one turn produced, in emission order.
#[derive(Debug, Clone)]
pub struct Turn {
    /// The assistant message first, then one tool message per call.
    pub messages: Vec<Message>,
    /// `TurnComplete` or `Error`
    pub state: TurnState,
    pub tool_calls: Vec<ToolCall>,
}

impl Turn {
    pub fn assistant(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn tool_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().skip(1)
    }

    pub fn is_error(&self) -> bool {
        self.state == TurnState::Error
    }

    /// Whether the caller should run another turn to let the model react.
    pub fn has_tool_results(&self) -> bool {
        self.messages.len() > 1
    }
}

/// Failures that abort a turn.
#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error(transparent)]
    Context(#[from] crate::context::ContextError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

struct StateTrace {
    state: TurnState,
    instance_id: String,
}

impl StateTrace {
    fn new(instance_id: &str) -> Self {
        debug!(instance = instance_id, state = %TurnState::BuildingContext, "Turn started");
        Self {
            state: TurnState::BuildingContext,
            instance_id: instance_id.to_string(),
        }
    }

    fn to(&mut self, next: TurnState) {
        debug!(instance = %self.instance_id, from = %self.state, to = %next, "Turn state");
        self.state = next;
    }
}

/// Drives single conversation turns. Holds no cross-turn state, so one
/// instance may serve many conversations concurrently.
pub struct QueryOrchestrator {
    backend: Arc<dyn ModelBackend>,
    registry: Arc<ToolRegistry>,
    prompt_builder: SystemPromptBuilder,
    context_provider: Arc<dyn ContextProvider>,
    interpreter: Arc<dyn ResponseInterpreter>,
    observers: Vec<Arc<dyn ToolObserver>>,
    model_timeout: Duration,
    default_timeout: Duration,
    skip_permissions: bool,
}

impl QueryOrchestrator {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        registry: Arc<ToolRegistry>,
        prompt_builder: SystemPromptBuilder,
        context_provider: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            backend,
            registry,
            prompt_builder,
            context_provider,
            interpreter: Arc::new(ActionBlockInterpreter),
            observers: Vec::new(),
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            default_timeout: DEFAULT_TOOL_TIMEOUT,
            skip_permissions: false,
        }
    }

    pub fn with_interpreter(mut self, interpreter: Arc<dyn ResponseInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Skip mode used when a turn brings no `ToolUseContext`.
    pub fn with_skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    /// Per-call tool timeout used when a turn brings no `ToolUseContext`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one turn over `messages` (owned by the caller, not modified).
    pub async fn query(&self, messages: &[Message], tool_context: &ToolContext, options: TurnOptions) -> Turn {
        let mut trace = StateTrace::new(&tool_context.instance_id);

        let tool_use_context = options.tool_use_context.unwrap_or_else(|| {
            ToolUseContext::from_registry(&self.registry, self.skip_permissions, self.default_timeout)
        });

        let response = match self
            .prepare_and_generate(messages, options.context, &tool_use_context, &mut trace)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!(instance = %tool_context.instance_id, error = %e, "Turn aborted");
                trace.to(TurnState::Error);
                return Turn {
                    messages: vec![Message::assistant(format!(
                        "I encountered an error: {e}. Please try again or rephrase your request."
                    ))],
                    state: TurnState::Error,
                    tool_calls: Vec::new(),
                };
            }
        };

        let calls = self.interpreter.interpret(&response);
        let mut emitted = vec![Message::assistant_with_calls(response, calls.clone())];

        let Some(calls) = calls else {
            trace.to(TurnState::TurnComplete);
            info!(instance = %tool_context.instance_id, "Turn complete without tool calls");
            return Turn {
                messages: emitted,
                state: TurnState::TurnComplete,
                tool_calls: Vec::new(),
            };
        };

        trace.to(TurnState::HasCalls);
        info!(instance = %tool_context.instance_id, count = calls.len(), "Executing tool calls");
        trace.to(TurnState::ExecutingTools);

        let approval = options.can_use_tool.as_deref();
        for call in &calls {
            let content = self
                .handle_call(call, tool_context, &tool_use_context, approval)
                .await;
            emitted.push(Message::tool_result(call, content));
        }

        trace.to(TurnState::TurnComplete);
        Turn {
            messages: emitted,
            state: TurnState::TurnComplete,
            tool_calls: calls,
        }
    }

    async fn prepare_and_generate(
        &self,
        messages: &[Message],
        context: Option<ContextSections>,
        tool_use_context: &ToolUseContext,
        trace: &mut StateTrace,
    ) -> Result<String, TurnError> {
        let context = match context {
            Some(context) => context,
            None => self.context_provider.sections().await?,
        };
        let sections = self.prompt_builder.build().await;
        let system_prompt =
            SystemPromptBuilder::join(&self.prompt_builder.format_with_context(sections, &context));
        let descriptors = describe_tools(tool_use_context.tools());
        debug!(tools = descriptors.len(), context = context.len(), "Prompt assembled");

        trace.to(TurnState::AwaitingModel);
        let generation = self.backend.generate(&system_prompt, messages, &descriptors);
        match tokio::time::timeout(self.model_timeout, generation).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ModelError::Timeout(self.model_timeout).into()),
        }
    }

    /// Resolve, authorise and run one call; returns the tool message text.
    async fn handle_call(
        &self,
        call: &ToolCall,
        tool_context: &ToolContext,
        tool_use_context: &ToolUseContext,
        approval: Option<&dyn ApprovalCallback>,
    ) -> String {
        let Some(tool) = self.resolve(&call.name, tool_use_context) else {
            warn!(tool = %call.name, call_id = %call.id, "Unknown tool requested");
            return format!("Error: No such tool available: {}", call.name);
        };

        match PermissionPolicy::decide(
            &self.registry,
            &call.name,
            &call.arguments,
            tool_use_context.dangerous_skip_permissions,
            approval,
        ) {
            PermissionDecision::Allowed => {}
            PermissionDecision::Denied => {
                info!(tool = %call.name, call_id = %call.id, "Tool call denied by approval callback");
                return format!("Error: Permission denied for tool: {}", call.name);
            }
            PermissionDecision::DangerousRequiresPermission => {
                info!(tool = %call.name, call_id = %call.id, "Dangerous tool blocked");
                return format!("Error: Dangerous tool {} requires permission", call.name);
            }
        }

        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        let (content, success) = execute_isolated(tool, call, tool_context, tool_use_context.timeout).await;
        for observer in &self.observers {
            observer.on_tool_result(tool_context, call, &content, success);
        }
        content
    }

    /// Registry first, then tools the caller placed in the turn context.
    fn resolve(&self, name: &str, tool_use_context: &ToolUseContext) -> Option<Arc<dyn Tool>> {
        self.registry.get(name).or_else(|| tool_use_context.find(name))
    }
}

/// Run a tool with a timeout, containing errors and panics.
async fn execute_isolated(
    tool: Arc<dyn Tool>,
    call: &ToolCall,
    tool_context: &ToolContext,
    timeout: Duration,
) -> (String, bool) {
    let execution = AssertUnwindSafe(tool.execute(call.arguments.clone(), tool_context)).catch_unwind();
    let failure = match tokio::time::timeout(timeout, execution).await {
        Ok(Ok(Ok(result))) => {
            if !result.success {
                debug!(tool = %call.name, call_id = %call.id, "Tool reported failure");
            }
            return (result.render(), result.success);
        }
        Ok(Ok(Err(e))) => e.to_string(),
        Ok(Err(panic)) => format!("tool panicked: {}", panic_message(panic.as_ref())),
        Err(_) => ToolError::Timeout(timeout).to_string(),
    };
    warn!(tool = %call.name, call_id = %call.id, error = %failure, "Tool execution failed");
    (format!("Error: Tool execution failed: {failure}"), false)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
