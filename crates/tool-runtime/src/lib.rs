pub mod bridge;
pub mod context;
pub mod descriptor;
pub mod interpreter;
pub mod message;
pub mod observer;
pub mod orchestrator;
pub mod permission;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod tool;
pub mod tools;

pub use bridge::{BridgeError, LlmProviderBridge, SimpleLlmProvider, SimpleMessage, SimpleRole};
pub use context::{
    ContextError, ContextProvider, ContextSections, ProjectContextProvider, StaticContextProvider,
};
pub use descriptor::{describe_tools, FunctionDescriptor, ToolDescriptor};
pub use interpreter::{ActionBlockInterpreter, ResponseInterpreter};
pub use message::{Conversation, Message, Role, ToolCall};
pub use observer::{RewardTracker, ToolObserver};
pub use orchestrator::{QueryOrchestrator, ToolUseContext, Turn, TurnOptions, TurnState};
pub use permission::{
    ApprovalCallback, PermissionDecision, PermissionLevel, PermissionPolicy, RuleApproval,
};
pub use prompt::SystemPromptBuilder;
pub use provider::{ModelBackend, ModelError};
pub use registry::{RegistryError, ToolRecord, ToolRegistry};
pub use tool::{EchoTool, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
pub use tools::{
    register_builtin_tools, BashTool, BuiltinHandles, BuiltinToolsConfig, Completion, EditFileTool,
    FileReadTool, FileWriteTool, FinishTool, GrepTool, ListDirTool, MemoryReadTool, MemoryWriteTool,
    SearchFilesTool, ThinkTool,
};
