use colored::*;
use std::io::{self, Write};

/// Longest tool output printed before truncation, in characters
const MAX_TOOL_OUTPUT: usize = 500;

/// Console handles all terminal output with colored formatting
pub struct Console {
    user_color: Color,
    assistant_color: Color,
    tool_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            user_color: Color::Cyan,
            assistant_color: Color::Green,
            tool_color: Color::Magenta,
        }
    }

    /// Print a user message with colored formatting
    pub fn print_user(&self, message: &str) {
        println!("{} {}", "User:".color(self.user_color).bold(), message);
    }

    /// Print an assistant message prefix (without newline)
    pub fn print_assistant_prefix(&self) {
        print!("{} ", "Assistant:".color(self.assistant_color).bold());
        let _ = io::stdout().flush();
    }

    /// Print a chunk of assistant response (for streaming)
    pub fn print_assistant_chunk(&self, chunk: &str) {
        print!("{}", chunk.color(self.assistant_color));
        let _ = io::stdout().flush();
    }

    /// Print a newline
    pub fn println(&self) {
        println!();
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Print a tool block header
    pub fn print_tool_action(&self, tool_name: &str, input: &str) {
        println!("{}", "─".repeat(60).color(self.tool_color));
        println!(
            "{} {} {}",
            "Tool:".color(self.tool_color).bold(),
            format!("[{}]", tool_name).color(self.tool_color),
            input
        );
    }

    /// Print a tool result and close the tool block
    pub fn print_tool_result(&self, result: &str, is_error: bool) {
        let text = truncate(result, MAX_TOOL_OUTPUT);
        if is_error {
            println!("{}", text.red());
        } else {
            println!("{}", text.bright_black());
        }
        println!("{}", "─".repeat(60).color(self.tool_color));
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...\n(output truncated)", &text[..cut]),
        None => text.to_string(),
    }
}
