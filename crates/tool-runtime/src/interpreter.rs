//! Extraction of tool calls from free-form model output.
//!
//! The model is asked to write `Action: {"name": ..., "parameters": {...}}`
//! anywhere in its reply. Each block is parsed as a single JSON value
//! straight from the text, so nested objects and braces inside strings are
//! handled without a hand-written scanner.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::message::ToolCall;

const ACTION_MARKER: &str = "Action:";

/// Turns raw model text into tool calls.
///
/// Returns `None` when the response requests no tools; `Some` always holds
/// at least one call. Never fails: unusable blocks are dropped.
pub trait ResponseInterpreter: Send + Sync {
    fn interpret(&self, response: &str) -> Option<Vec<ToolCall>>;
}

/// Default interpreter for the `Action: {json}` convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionBlockInterpreter;

impl ActionBlockInterpreter {
    pub fn new() -> Self {
        Self
    }
}

impl ResponseInterpreter for ActionBlockInterpreter {
    fn interpret(&self, response: &str) -> Option<Vec<ToolCall>> {
        let mut calls = Vec::new();
        let mut cursor = 0;

        while let Some(found) = response[cursor..].find(ACTION_MARKER) {
            let after_marker = cursor + found + ACTION_MARKER.len();
            let rest = &response[after_marker..];
            let body = rest.trim_start();
            let body_start = after_marker + (rest.len() - body.len());
            cursor = after_marker;

            if !body.starts_with('{') {
                trace!(offset = after_marker, "Action marker without object, skipping");
                continue;
            }

            let mut stream = serde_json::Deserializer::from_str(body).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) => {
                    cursor = body_start + stream.byte_offset();
                    if let Some((name, arguments)) = call_parts(value) {
                        let id = format!("call_{}", calls.len());
                        calls.push(ToolCall { id, name, arguments });
                    } else {
                        debug!(offset = body_start, "Action block without a name, skipping");
                    }
                }
                Some(Err(e)) => {
                    debug!(offset = body_start, error = %e, "Malformed action block, skipping");
                }
                None => {}
            }
        }

        if calls.is_empty() {
            None
        } else {
            debug!(count = calls.len(), "Extracted tool calls");
            Some(calls)
        }
    }
}

/// Accept objects with a string `name`; `parameters` defaults to empty.
fn call_parts(value: Value) -> Option<(String, Map<String, Value>)> {
    let Value::Object(mut object) = value else {
        return None;
    };
    let name = match object.remove("name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => return None,
    };
    let arguments = match object.remove("parameters") {
        Some(Value::Object(parameters)) => parameters,
        _ => Map::new(),
    };
    Some((name, arguments))
}
