//! End-to-end turns through the orchestrator with a scripted model backend.
//!
//! Each test builds a fresh registry and orchestrator; nothing is shared
//! across tests except what a test shares on purpose.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use orchestra_tool_runtime::provider::mock::MockBackend;
use orchestra_tool_runtime::{
    register_builtin_tools, BuiltinToolsConfig, ListDirTool, Message, QueryOrchestrator, Role,
    SearchFilesTool, StaticContextProvider, SystemPromptBuilder, Tool, ToolContext, ToolDefinition,
    ToolError, ToolRegistry, ToolResult, ToolUseContext, TurnOptions, TurnState,
};

/// Records every invocation; optionally sleeps before answering.
struct Probe {
    name: &'static str,
    delay: Duration,
    invocations: Arc<AtomicUsize>,
    finished: Arc<Mutex<Vec<&'static str>>>,
}

impl Probe {
    fn new(name: &'static str, delay: Duration, finished: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            name,
            delay,
            invocations: Arc::new(AtomicUsize::new(0)),
            finished,
        }
    }
}

#[async_trait]
impl Tool for Probe {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: format!("probe {}", self.name),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(
        &self,
        _arguments: Map<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.lock().unwrap().push(self.name);
        Ok(ToolResult::ok(format!("{} done", self.name)))
    }
}

fn orchestrator(backend: Arc<MockBackend>, registry: ToolRegistry, dir: &std::path::Path) -> QueryOrchestrator {
    QueryOrchestrator::new(
        backend,
        Arc::new(registry),
        SystemPromptBuilder::new("orchestra", dir),
        Arc::new(StaticContextProvider::empty()),
    )
}

fn contents(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

#[tokio::test]
async fn search_files_call_yields_literal_tool_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.py"), "print('hi')").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "").unwrap();

    let mut registry = ToolRegistry::new();
    registry.register(SearchFilesTool::new(), true, false).unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.queue_text(r#"Looking. Action: {"name": "search_files", "parameters": {"pattern": "*.py"}}"#);

    let ctx = ToolContext::new("scenario-1", dir.path());
    let turn = orchestrator(backend, registry, dir.path())
        .query(&[Message::user("find python files")], &ctx, TurnOptions::default())
        .await;

    assert_eq!(turn.state, TurnState::TurnComplete);
    assert_eq!(turn.tool_calls.len(), 1);
    assert_eq!(turn.tool_calls[0].id, "call_0");
    assert_eq!(turn.messages.len(), 2);

    let tool_msg = &turn.messages[1];
    assert_eq!(tool_msg.role, Role::Tool);
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_0"));
    assert_eq!(
        tool_msg.content,
        format!(
            "Found 1 files matching pattern '*.py' in {}:\n\napp.py",
            dir.path().display()
        )
    );
}

#[tokio::test]
async fn unknown_tool_then_known_tool_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ToolRegistry::new();
    registry.register(ListDirTool, true, false).unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.queue_text(concat!(
        "Action: {\"name\": \"ghost_tool\", \"parameters\": {}}\n",
        "Action: {\"name\": \"list_dir\", \"parameters\": {\"path\": \"/x\"}}"
    ));

    let ctx = ToolContext::new("scenario-2", dir.path());
    let turn = orchestrator(backend, registry, dir.path())
        .query(&[Message::user("look around")], &ctx, TurnOptions::default())
        .await;

    let tools: Vec<&Message> = turn.tool_messages().collect();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].content, "Error: No such tool available: ghost_tool");
    assert_eq!(tools[0].tool_call_id.as_deref(), Some("call_0"));
    assert_eq!(tools[1].content, "Error: Directory not found: /x");
    assert_eq!(tools[1].tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn dangerous_write_is_blocked_without_skip_mode() {
    let dir = tempfile::tempdir().unwrap();
    let memory = tempfile::tempdir().unwrap();
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, BuiltinToolsConfig::new(memory.path())).unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.queue_text(r#"Action: {"name": "write_file", "parameters": {"path": "out.txt", "content": "x"}}"#);

    let ctx = ToolContext::new("scenario-3", dir.path());
    let turn = orchestrator(backend, registry, dir.path())
        .query(&[Message::user("write it")], &ctx, TurnOptions::default())
        .await;

    assert_eq!(
        contents(&turn.messages)[1],
        "Error: Dangerous tool write_file requires permission"
    );
    assert!(!dir.path().join("out.txt").exists());
}

#[tokio::test]
async fn model_failure_yields_single_assistant_message() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_error("connection reset");

    let ctx = ToolContext::new("scenario-4", dir.path());
    let turn = orchestrator(backend, ToolRegistry::new(), dir.path())
        .query(&[Message::user("hello")], &ctx, TurnOptions::default())
        .await;

    assert!(turn.is_error());
    assert_eq!(turn.messages.len(), 1);
    assert_eq!(turn.messages[0].role, Role::Assistant);
    assert!(turn.messages[0].content.contains("connection reset"));
    assert!(turn.tool_calls.is_empty());
}

#[tokio::test]
async fn plain_reply_has_no_tool_phase() {
    let dir = tempfile::tempdir().unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let probe = Probe::new("probe", Duration::ZERO, finished);
    let invocations = probe.invocations.clone();
    let mut registry = ToolRegistry::new();
    registry.register(probe, true, false).unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.queue_text("No tools needed. Action: {\"parameters\": {}} and Action: not json");

    let ctx = ToolContext::new("plain", dir.path());
    let turn = orchestrator(backend, registry, dir.path())
        .query(&[Message::user("hi")], &ctx, TurnOptions::default())
        .await;

    assert_eq!(turn.messages.len(), 1);
    assert!(!turn.has_tool_results());
    assert_eq!(turn.messages[0].tool_calls, None);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_valid_block_becomes_a_call() {
    let dir = tempfile::tempdir().unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let probe = Probe::new("probe", Duration::ZERO, finished);
    let invocations = probe.invocations.clone();
    let mut registry = ToolRegistry::new();
    registry.register(probe, true, false).unwrap();

    let response: String = (0..4)
        .map(|i| format!("step {i}\nAction: {{\"name\": \"probe\", \"parameters\": {{\"n\": {i}}}}}\n"))
        .collect();
    let backend = Arc::new(MockBackend::new());
    backend.queue_text(&response);

    let ctx = ToolContext::new("many", dir.path());
    let turn = orchestrator(backend, registry, dir.path())
        .query(&[Message::user("go")], &ctx, TurnOptions::default())
        .await;

    let ids: Vec<&str> = turn.tool_calls.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["call_0", "call_1", "call_2", "call_3"]);
    assert_eq!(turn.tool_calls[2].arguments["n"], json!(2));
    assert_eq!(turn.messages.len(), 5);
    assert_eq!(invocations.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn slow_call_still_reported_before_fast_call() {
    let dir = tempfile::tempdir().unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    registry
        .register(Probe::new("slow", Duration::from_millis(150), finished.clone()), true, false)
        .unwrap();
    registry
        .register(Probe::new("fast", Duration::ZERO, finished.clone()), true, false)
        .unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.queue_text("Action: {\"name\": \"slow\"}\nAction: {\"name\": \"fast\"}");

    let ctx = ToolContext::new("ordering", dir.path());
    let turn = orchestrator(backend, registry, dir.path())
        .query(&[Message::user("go")], &ctx, TurnOptions::default())
        .await;

    assert_eq!(contents(&turn.messages)[1..], ["slow done", "fast done"]);
    assert_eq!(*finished.lock().unwrap(), vec!["slow", "fast"]);
}

#[tokio::test]
async fn refused_call_has_no_side_effect() {
    let dir = tempfile::tempdir().unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let probe = Probe::new("probe", Duration::ZERO, finished);
    let invocations = probe.invocations.clone();
    let mut registry = ToolRegistry::new();
    registry.register(probe, true, false).unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.queue_text("Action: {\"name\": \"probe\"}");

    let refuse = |_: &str, _: &Map<String, Value>| false;
    let ctx = ToolContext::new("denied", dir.path());
    let turn = orchestrator(backend, registry, dir.path())
        .query(
            &[Message::user("go")],
            &ctx,
            TurnOptions::default().with_approval(Arc::new(refuse)),
        )
        .await;

    assert_eq!(contents(&turn.messages)[1], "Error: Permission denied for tool: probe");
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dangerous_gate_opens_for_skip_mode_or_explicit_approval() {
    let dir = tempfile::tempdir().unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let probe = Arc::new(Probe::new("nuke", Duration::ZERO, finished));
    let invocations = probe.invocations.clone();
    let mut registry = ToolRegistry::new();
    registry.register_arc(probe, false, true).unwrap();
    let registry = Arc::new(registry);

    let backend = Arc::new(MockBackend::new());
    for _ in 0..3 {
        backend.queue_text("Action: {\"name\": \"nuke\"}");
    }
    let orchestrator = QueryOrchestrator::new(
        backend,
        registry.clone(),
        SystemPromptBuilder::new("orchestra", dir.path()),
        Arc::new(StaticContextProvider::empty()),
    );
    let ctx = ToolContext::new("gate", dir.path());
    let history = [Message::user("go")];

    // Gated: dangerous tool, skip off, no callback.
    let gated = orchestrator.query(&history, &ctx, TurnOptions::default()).await;
    assert_eq!(contents(&gated.messages)[1], "Error: Dangerous tool nuke requires permission");
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    // Skip mode.
    let skip = ToolUseContext::from_registry(&registry, true, Duration::from_secs(5));
    let skipped = orchestrator
        .query(&history, &ctx, TurnOptions::default().with_tool_use_context(skip))
        .await;
    assert_eq!(contents(&skipped.messages)[1], "nuke done");
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    // Explicit approval.
    let allow = |name: &str, _: &Map<String, Value>| name == "nuke";
    let approved = orchestrator
        .query(&history, &ctx, TurnOptions::default().with_approval(Arc::new(allow)))
        .await;
    assert_eq!(contents(&approved.messages)[1], "nuke done");
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn reregistration_serves_latest_instance() {
    let dir = tempfile::tempdir().unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let first = Probe::new("probe", Duration::ZERO, finished.clone());
    let second = Probe::new("probe", Duration::ZERO, finished);
    let first_hits = first.invocations.clone();
    let second_hits = second.invocations.clone();

    let mut registry = ToolRegistry::new();
    registry.register(first, true, false).unwrap();
    registry.register(second, false, true).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.is_dangerous("probe"));

    let backend = Arc::new(MockBackend::new());
    backend.queue_text("Action: {\"name\": \"probe\"}");
    let ctx = ToolContext::new("rereg", dir.path());
    let allow = |_: &str, _: &Map<String, Value>| true;
    orchestrator(backend, registry, dir.path())
        .query(&[Message::user("go")], &ctx, TurnOptions::default().with_approval(Arc::new(allow)))
        .await;

    assert_eq!(first_hits.load(Ordering::SeqCst), 0);
    assert_eq!(second_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backend_sees_prompt_tools_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let memory = tempfile::tempdir().unwrap();
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, BuiltinToolsConfig::new(memory.path())).unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.queue_text("Done.");
    let orchestrator = QueryOrchestrator::new(
        backend.clone(),
        Arc::new(registry),
        SystemPromptBuilder::new("orchestra", dir.path()),
        Arc::new(StaticContextProvider::empty().with_section("ticket", "ORC-12")),
    );
    let ctx = ToolContext::new("prompt", dir.path());
    let history = vec![Message::user("first"), Message::assistant("ok"), Message::user("second")];
    orchestrator.query(&history, &ctx, TurnOptions::default()).await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].messages, history);
    assert!(calls[0].system_prompt.contains("<context name=\"ticket\">ORC-12</context>"));
    assert!(calls[0].system_prompt.contains("Action:"));
    // Dangerous tools are hidden from the model unless skip mode is on.
    assert!(calls[0].tool_names.contains(&"read_file".to_string()));
    assert!(!calls[0].tool_names.contains(&"bash".to_string()));
}

#[tokio::test]
async fn concurrent_conversations_share_registry() {
    let dir = tempfile::tempdir().unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let probe = Probe::new("probe", Duration::from_millis(20), finished);
    let invocations = probe.invocations.clone();
    let mut registry = ToolRegistry::new();
    registry.register(probe, true, false).unwrap();
    let registry = Arc::new(registry);

    let mut handles = Vec::new();
    for i in 0..8 {
        let backend = Arc::new(MockBackend::new());
        backend.queue_text("Action: {\"name\": \"probe\"}\nAction: {\"name\": \"probe\"}");
        let orchestrator = QueryOrchestrator::new(
            backend,
            registry.clone(),
            SystemPromptBuilder::new("orchestra", dir.path()),
            Arc::new(StaticContextProvider::empty()),
        );
        let ctx = ToolContext::new(format!("conv-{i}"), dir.path());
        handles.push(tokio::spawn(async move {
            orchestrator
                .query(&[Message::user("go")], &ctx, TurnOptions::default())
                .await
        }));
    }

    for handle in handles {
        let turn = handle.await.unwrap();
        assert_eq!(turn.state, TurnState::TurnComplete);
        assert_eq!(contents(&turn.messages)[1..], ["probe done", "probe done"]);
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 16);
}
