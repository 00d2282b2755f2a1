//! Slash command parsing and execution for the chat loop.
//!
//! Commands start with `/` and provide in-chat controls for the session:
//! reset, analytics, export, theme and history.

use std::path::PathBuf;

use console::style;

use cyphernova_core::export::ExportFormat;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Reset the conversation to the greeting.
    Clear,
    /// Show session analytics.
    Stats,
    /// Export the transcript, optionally to a given path.
    Export {
        format: ExportFormat,
        path: Option<PathBuf>,
    },
    /// Switch between light and dark rendering.
    Theme,
    /// Show the conversation so far.
    History,
    /// Exit the chat session.
    Exit,
    /// Unknown command or bad arguments.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts
        .get(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/reset" => Some(ChatCommand::Clear),
        "/stats" | "/analytics" => Some(ChatCommand::Stats),
        "/export" => Some(parse_export(arg)),
        "/theme" => Some(ChatCommand::Theme),
        "/history" => Some(ChatCommand::History),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// `/export`, `/export json`, `/export notes.txt`, `/export json notes.json`.
fn parse_export(arg: Option<String>) -> ChatCommand {
    let Some(arg) = arg else {
        return ChatCommand::Export {
            format: ExportFormat::Text,
            path: None,
        };
    };

    let mut words = arg.splitn(2, ' ');
    let first = words.next().unwrap_or_default();
    let rest = words.next().map(str::trim).filter(|s| !s.is_empty());

    if let Ok(format) = first.parse::<ExportFormat>() {
        return ChatCommand::Export {
            format,
            path: rest.map(PathBuf::from),
        };
    }
    if rest.is_some() {
        return ChatCommand::Unknown(format!("/export: unknown format '{first}'"));
    }

    let path = PathBuf::from(first);
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
        _ => ExportFormat::Text,
    };
    ChatCommand::Export {
        format,
        path: Some(path),
    }
}

/// Print the help text listing all available commands.
pub fn print_help() {
    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    let rows = [
        ("/help", "Show this help message"),
        ("/clear", "Start over from the greeting"),
        ("/stats", "Show chat analytics"),
        ("/export [json] [path]", "Save the conversation"),
        ("/theme", "Toggle light/dark rendering"),
        ("/history", "Show the conversation so far"),
        ("/exit", "End the chat session"),
    ];
    for (cmd, desc) in rows {
        println!("  {:<24}{desc}", style(cmd).cyan());
    }
    println!();
    println!(
        "  {}",
        style("Ctrl+D to exit, Ctrl+C safe (no message loss)").dim()
    );
    println!();
}
