//! Session analytics summary shapes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a session's analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_messages: u32,
    pub user_messages: u32,
    pub bot_messages: u32,
    pub session_start: DateTime<Utc>,
    /// Elapsed time since `session_start`.
    pub session_duration: Duration,
    /// Mean backend response time in seconds; absent until a reply is timed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_response_time: Option<f64>,
    pub models_used: Vec<String>,
}

impl AnalyticsSummary {
    /// Session duration as `H:MM:SS`.
    pub fn duration_display(&self) -> String {
        format_duration(self.session_duration)
    }
}

/// Format a duration as `H:MM:SS`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
