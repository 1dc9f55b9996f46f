use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use orchestra_tool_runtime::Turn;
use serde_json::{Map, Value};
use std::io::{self, Write};

const MAX_RESULT_CHARS: usize = 500;
const MAX_ARGS_CHARS: usize = 200;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const USER_PROMPT: Color = Color::Green;
    const ASSISTANT_TEXT: Color = Color::Cyan;
    const TOOL_CALL: Color = Color::Yellow;
    const TOOL_RESULT: Color = Color::DarkGreen;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Terminal I/O for the REPL and one-shot runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    pub fn print_banner(&self, provider: &str, model: &str, working_dir: &str, skip: bool) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("orchestra"),
            ResetColor,
            Print(" - tool-calling agent\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!("Provider: {} | Model: {}\n", provider, model)),
            Print(format!("Working dir: {}\n", working_dir)),
        )?;
        if skip {
            execute!(
                stdout,
                SetForegroundColor(Colors::ERROR),
                Print("Dangerous tools run without confirmation.\n"),
            )?;
        }
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print("Type 'exit' or 'quit' to end.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Read a line of user input with prompt.
    /// Returns None on EOF or when the user wants to exit.
    pub fn read_input(&self) -> Result<Option<String>> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::USER_PROMPT),
            Print("you> "),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let trimmed = input.trim().to_string();

        if matches!(trimmed.as_str(), "exit" | "quit" | "/exit" | "/quit") {
            return Ok(None);
        }
        Ok(Some(trimmed))
    }

    /// Print the assistant reply, then each tool call with its result.
    pub fn display_turn(&self, turn: &Turn) -> Result<()> {
        let mut stdout = io::stdout();
        if let Some(assistant) = turn.assistant() {
            let color = if turn.is_error() { Colors::ERROR } else { Colors::ASSISTANT_TEXT };
            execute!(
                stdout,
                Print("\n"),
                SetForegroundColor(color),
                Print(format!("{}\n", assistant.content.trim_end())),
                ResetColor,
            )?;
        }

        for (call, message) in turn.tool_calls.iter().zip(turn.tool_messages()) {
            let args = truncate(&Value::Object(call.arguments.clone()).to_string(), MAX_ARGS_CHARS);
            let is_error = message.content.starts_with("Error:");
            execute!(
                stdout,
                SetForegroundColor(Colors::TOOL_CALL),
                Print(format!("[tool: {}] ", call.name)),
                SetForegroundColor(Colors::DIM),
                Print(format!("{}\n", args)),
                SetForegroundColor(if is_error { Colors::ERROR } else { Colors::TOOL_RESULT }),
                Print(format!("  {}\n", truncate(&message.content, MAX_RESULT_CHARS))),
                ResetColor,
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Prompt the user for a yes/no permission decision.
    pub fn prompt_permission(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<bool> {
        let mut stdout = io::stdout();
        let summary = truncate(&Value::Object(arguments.clone()).to_string(), MAX_ARGS_CHARS);
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::TOOL_CALL),
            Print(format!(
                "Tool '{}' requires confirmation.\n  Input: {}\n",
                tool_name, summary
            )),
            ResetColor,
            SetForegroundColor(Colors::USER_PROMPT),
            Print("Allow? [y/N] "),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let trimmed = input.trim().to_lowercase();
        Ok(trimmed == "y" || trimmed == "yes")
    }

    pub fn print_sessions(&self, sessions: &[crate::session::SessionSummary]) -> Result<()> {
        let mut stdout = io::stdout();
        if sessions.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("No saved sessions found.\n"),
                ResetColor,
            )?;
            return Ok(());
        }

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("Saved Sessions:\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "{:<18} {:<40} {:<10} {:<6} {}\n",
                "ID", "NAME", "PROVIDER", "MSGS", "UPDATED"
            )),
            Print(format!("{}\n", "-".repeat(96))),
            ResetColor,
        )?;

        for s in sessions {
            execute!(
                stdout,
                Print(format!(
                    "{:<18} {:<40} {:<10} {:<6} {}\n",
                    s.id,
                    truncate(&s.name, 38),
                    s.provider,
                    s.message_count,
                    s.updated_at.format("%Y-%m-%d %H:%M"),
                )),
            )?;
        }

        stdout.flush()?;
        Ok(())
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}

/// Cut to `max` characters, noting the original length.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}... ({} chars total)", &text[..cut], text.chars().count()),
        None => text.to_string(),
    }
}
