//! Session analytics aggregation.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use cyphernova_types::analytics::AnalyticsSummary;
use cyphernova_types::chat::{MessageRole, Turn};

/// Credited to seeded replies that carry a timing but no model.
const UNKNOWN_MODEL: &str = "unknown";

/// Running counters for one session.
///
/// The greeting is synthetic and never counted.
#[derive(Debug, Clone)]
pub struct SessionAnalytics {
    total_messages: u32,
    user_messages: u32,
    bot_messages: u32,
    session_start: DateTime<Utc>,
    models_used: BTreeSet<String>,
    response_times: Vec<Duration>,
}

impl Default for SessionAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAnalytics {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(session_start: DateTime<Utc>) -> Self {
        Self {
            total_messages: 0,
            user_messages: 0,
            bot_messages: 0,
            session_start,
            models_used: BTreeSet::new(),
            response_times: Vec::new(),
        }
    }

    /// Counters for turns that were appended before this aggregator existed.
    ///
    /// `turns` excludes the greeting. Assistant turns without a response
    /// time, or flagged as errors, count as error turns.
    pub fn replay(turns: &[Turn], session_start: DateTime<Utc>) -> Self {
        let mut analytics = Self::starting_at(session_start);
        for turn in turns {
            match (turn.role, turn.response_time) {
                (MessageRole::User, _) => analytics.record_user_turn(),
                (MessageRole::Assistant, Some(elapsed)) if !turn.error => analytics
                    .record_bot_turn(elapsed, turn.model.as_deref().unwrap_or(UNKNOWN_MODEL)),
                (MessageRole::Assistant, _) => analytics.record_error_turn(),
                (MessageRole::System, _) => {}
            }
        }
        analytics
    }

    pub fn record_user_turn(&mut self) {
        self.total_messages += 1;
        self.user_messages += 1;
    }

    pub fn record_bot_turn(&mut self, response_time: Duration, model: &str) {
        self.total_messages += 1;
        self.bot_messages += 1;
        self.response_times.push(response_time);
        self.models_used.insert(model.to_string());
    }

    /// A bot turn that reports a failure: counted, but not timed.
    pub fn record_error_turn(&mut self) {
        self.total_messages += 1;
        self.bot_messages += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub fn response_times(&self) -> &[Duration] {
        &self.response_times
    }

    /// Mean response time in seconds, `None` before any reply was timed.
    pub fn average_response_time(&self) -> Option<f64> {
        if self.response_times.is_empty() {
            return None;
        }
        let total: f64 = self.response_times.iter().map(Duration::as_secs_f64).sum();
        Some(total / self.response_times.len() as f64)
    }

    pub fn summary(&self) -> AnalyticsSummary {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> AnalyticsSummary {
        AnalyticsSummary {
            total_messages: self.total_messages,
            user_messages: self.user_messages,
            bot_messages: self.bot_messages,
            session_start: self.session_start,
            session_duration: (now - self.session_start).to_std().unwrap_or_default(),
            avg_response_time: self.average_response_time(),
            models_used: self.models_used.iter().cloned().collect(),
        }
    }
}
