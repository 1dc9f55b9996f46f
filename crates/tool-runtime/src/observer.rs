use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::message::ToolCall;
use crate::tool::ToolContext;

/// Notified after each executed tool call. The loop ignores observers'
/// state; they only watch.
pub trait ToolObserver: Send + Sync {
    fn on_tool_result(&self, context: &ToolContext, call: &ToolCall, content: &str, success: bool);
}

/// Per-instance quality scores in `[0, 1]` for offline reward signals.
///
/// `finish` calls score by declared completion (`true` 1.0, `partial` 0.5,
/// `false` 0.2); every other call scores 1.0 on success and 0.0 on failure.
#[derive(Debug, Default)]
pub struct RewardTracker {
    scores: Mutex<HashMap<String, Vec<f32>>>,
}

impl RewardTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score_call(call: &ToolCall, success: bool) -> f32 {
        if !success {
            return 0.0;
        }
        if call.name != "finish" {
            return 1.0;
        }
        match call.arguments.get("task_completed").and_then(Value::as_str) {
            Some("true") => 1.0,
            Some("partial") => 0.5,
            Some("false") => 0.2,
            _ => 0.0,
        }
    }

    pub fn scores(&self, instance_id: &str) -> Vec<f32> {
        self.scores
            .lock()
            .ok()
            .and_then(|s| s.get(instance_id).cloned())
            .unwrap_or_default()
    }

    /// Mean score, or 0.0 for an instance with no calls.
    pub fn mean(&self, instance_id: &str) -> f32 {
        let scores = self.scores(instance_id);
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        }
    }
}

impl ToolObserver for RewardTracker {
    fn on_tool_result(&self, context: &ToolContext, call: &ToolCall, _content: &str, success: bool) {
        let score = Self::score_call(call, success);
        debug!(instance = %context.instance_id, tool = %call.name, score, "Reward recorded");
        if let Ok(mut scores) = self.scores.lock() {
            scores
                .entry(context.instance_id.clone())
                .or_default()
                .push(score);
        }
    }
}
