//! Transcript export as a plain-text report or a JSON record.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::Serialize;

use cyphernova_types::analytics::AnalyticsSummary;
use cyphernova_types::chat::{MessageRole, Turn};
use cyphernova_types::error::ExportError;

const RULE_WIDTH: usize = 60;

/// Output format of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("invalid export format: '{other}'")),
        }
    }
}

/// A rendered export, ready to be written or downloaded.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub format: ExportFormat,
    pub file_name: String,
    pub body: String,
}

/// Suggested file name, e.g. `cyphernova_chat_20250301_1015.txt`.
pub fn export_file_name(format: ExportFormat, now: DateTime<Local>) -> String {
    format!(
        "cyphernova_chat_{}.{}",
        now.format("%Y%m%d_%H%M"),
        format.extension()
    )
}

/// Render a transcript export.
///
/// Refused while the transcript holds nothing but the greeting.
pub fn export(
    format: ExportFormat,
    turns: &[Turn],
    summary: &AnalyticsSummary,
    model: &str,
    now: DateTime<Local>,
) -> Result<ExportDocument, ExportError> {
    if turns.len() <= 1 {
        return Err(ExportError::NothingToExport);
    }
    let body = match format {
        ExportFormat::Text => render_text(turns, summary, now),
        ExportFormat::Json => render_json(turns, summary, model, now)?,
    };
    Ok(ExportDocument {
        format,
        file_name: export_file_name(format, now),
        body,
    })
}

/// Plain-text report: header, one entry per turn, analytics block.
pub fn render_text(turns: &[Turn], summary: &AnalyticsSummary, now: DateTime<Local>) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "CypherNova Chat Export - {}", now.format("%Y-%m-%d %H:%M"));
    let _ = write!(out, "{rule}\n\n");

    for turn in turns {
        let marker = match turn.role {
            MessageRole::User => "👤",
            _ => "🤖",
        };
        let role = turn.role.to_string().to_uppercase();
        let _ = write!(out, "{marker} {role}: {}\n\n", turn.content);
    }

    let _ = write!(out, "\n{rule}\n");
    out.push_str("CHAT ANALYTICS:\n");
    let _ = writeln!(out, "Total Messages: {}", summary.total_messages);
    let _ = writeln!(out, "User Messages: {}", summary.user_messages);
    let _ = writeln!(out, "Bot Messages: {}", summary.bot_messages);
    let _ = writeln!(out, "Session Duration: {}", summary.duration_display());
    if let Some(avg) = summary.avg_response_time {
        let _ = writeln!(out, "Average Response Time: {avg:.2}s");
    }
    if !summary.models_used.is_empty() {
        let _ = writeln!(out, "Models Used: {}", summary.models_used.join(", "));
    }
    out
}

#[derive(Serialize)]
struct JsonExport<'a> {
    timestamp: String,
    model_used: &'a str,
    conversation: &'a [Turn],
    analytics: &'a AnalyticsSummary,
}

/// JSON record: timestamp, model, conversation and analytics.
pub fn render_json(
    turns: &[Turn],
    summary: &AnalyticsSummary,
    model: &str,
    now: DateTime<Local>,
) -> Result<String, ExportError> {
    let record = JsonExport {
        timestamp: now.to_rfc3339(),
        model_used: model,
        conversation: turns,
        analytics: summary,
    };
    serde_json::to_string_pretty(&record).map_err(|e| ExportError::Serialization(e.to_string()))
}
