//! Async readline input for the chat loop.
//!
//! Wraps `rustyline_async::Readline`: Ctrl+D ends the session, Ctrl+C is
//! reported so the loop can remind the user how to leave.

use console::style;
use rustyline_async::{Readline, ReadlineError, ReadlineEvent};
use tracing::debug;

use cyphernova_types::chat::Theme;

#[derive(Debug)]
pub enum InputEvent {
    /// Trimmed; may be empty.
    Message(String),
    Eof,
    Interrupted,
}

pub struct ChatInput {
    rl: Readline,
}

fn prompt_for(theme: Theme) -> String {
    let label = match theme {
        Theme::Light => style("You >").green().bold(),
        Theme::Dark => style("You >").cyan().bold(),
    };
    format!("  {label} ")
}

impl ChatInput {
    pub fn new(theme: Theme) -> Result<Self, ReadlineError> {
        // Output goes straight to stdout between reads, so the shared writer is not kept.
        let (rl, _writer) = Readline::new(prompt_for(theme))?;
        Ok(Self { rl })
    }

    pub async fn read_line(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => {
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    self.rl.add_history_entry(trimmed.clone());
                }
                InputEvent::Message(trimmed)
            }
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(e) => {
                debug!(error = %e, "readline failed, ending session");
                InputEvent::Eof
            }
        }
    }

    /// Recolor the prompt after a theme switch.
    pub fn set_theme(&mut self, theme: Theme) {
        if let Err(e) = self.rl.update_prompt(&prompt_for(theme)) {
            debug!(error = %e, "could not update prompt");
        }
    }

    pub fn clear(&mut self) {
        let _ = self.rl.clear();
    }

    /// Restore the terminal before the process writes its final output.
    pub fn flush(&mut self) {
        let _ = self.rl.flush();
    }
}
