//! Multi-turn driver: runs orchestrator turns until the model stops calling
//! tools, the `finish` tool records a completion, or the turn budget runs out.

use chrono::Utc;
use orchestra_tool_runtime::{Conversation, FinishTool, QueryOrchestrator, ToolContext, Turn, TurnOptions};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last turn produced no tool messages.
    Settled,
    /// `finish` recorded a completion during this run.
    Finished,
    MaxTurns,
    /// The last turn ended in the fatal error state.
    Error,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Settled => "settled",
            StopReason::Finished => "finished",
            StopReason::MaxTurns => "max turns reached",
            StopReason::Error => "error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    pub turns: usize,
    pub stop: StopReason,
}

pub struct Driver {
    orchestrator: QueryOrchestrator,
    finish: Arc<FinishTool>,
    max_turns: usize,
    options: TurnOptions,
}

impl Driver {
    pub fn new(orchestrator: QueryOrchestrator, finish: Arc<FinishTool>, max_turns: usize) -> Self {
        Self {
            orchestrator,
            finish,
            max_turns: max_turns.max(1),
            options: TurnOptions::default(),
        }
    }

    /// Options applied to every turn (approval callback, tool context).
    pub fn with_turn_options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    /// Append `prompt` and run turns, handing each finished turn to `on_turn`
    /// before its messages join the conversation.
    pub async fn run<F>(
        &self,
        conversation: &mut Conversation,
        prompt: &str,
        tool_context: &ToolContext,
        mut on_turn: F,
    ) -> RunOutcome
    where
        F: FnMut(&Turn),
    {
        let started = Utc::now();
        conversation.push(orchestra_tool_runtime::Message::user(prompt));

        for iteration in 1..=self.max_turns {
            debug!(iteration, messages = conversation.len(), "Running turn");
            let turn = self
                .orchestrator
                .query(conversation.messages(), tool_context, self.options.clone())
                .await;
            on_turn(&turn);

            let errored = turn.is_error();
            let more = turn.has_tool_results();
            conversation.extend(turn.messages);

            let finished = self
                .finish
                .completion(&tool_context.instance_id)
                .is_some_and(|c| c.finished_at >= started);

            let stop = if errored {
                Some(StopReason::Error)
            } else if finished {
                Some(StopReason::Finished)
            } else if !more {
                Some(StopReason::Settled)
            } else {
                None
            };
            if let Some(stop) = stop {
                info!(iteration, %stop, "Run complete");
                return RunOutcome { turns: iteration, stop };
            }
        }

        warn!(max_turns = self.max_turns, "Turn budget exhausted");
        RunOutcome {
            turns: self.max_turns,
            stop: StopReason::MaxTurns,
        }
    }
}
