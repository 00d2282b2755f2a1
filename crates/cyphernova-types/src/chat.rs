//! Chat turn types for CypherNova.
//!
//! A conversation is an ordered list of [`Turn`]s. Turn content is always
//! plain text once stored; anything else is decoded through [`TurnContent`]
//! at the append boundary.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Turns and model messages share one role vocabulary.
pub use crate::llm::MessageRole;

/// One message exchanged in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Time the backend took to answer (assistant turns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<Duration>,
    /// Model credited with the answer (assistant turns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Set on assistant turns that report a backend failure.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl Turn {
    pub fn new(role: MessageRole, content: impl Into<TurnContent>) -> Self {
        Self {
            role,
            content: content.into().into_text(),
            timestamp: Utc::now(),
            response_time: None,
            model: None,
            error: false,
        }
    }

    pub fn user(content: impl Into<TurnContent>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<TurnContent>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// An assistant turn carrying the reply timing and the model that produced it.
    pub fn reply(
        content: impl Into<TurnContent>,
        response_time: Duration,
        model: impl Into<String>,
    ) -> Self {
        Self {
            response_time: Some(response_time),
            model: Some(model.into()),
            ..Self::assistant(content)
        }
    }

    /// A visible assistant turn describing a backend failure.
    pub fn error_reply(detail: impl fmt::Display) -> Self {
        Self {
            error: true,
            ..Self::assistant(format!("❌ Sorry, I encountered an error: {detail}"))
        }
    }
}

/// Turn content before it is stored.
///
/// Backends and older session state may hand over either plain text or a
/// structured response object; both collapse to text exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnContent {
    Text(String),
    Structured(serde_json::Value),
}

impl TurnContent {
    /// Decode a raw JSON value, accepting only shapes that carry text.
    ///
    /// Strings and objects with a string `content` field are accepted;
    /// anything else yields `None`.
    pub fn decode(value: serde_json::Value) -> Option<Self> {
        let carries_text = match &value {
            serde_json::Value::String(_) => true,
            serde_json::Value::Object(map) => map.get("content").is_some_and(|c| c.is_string()),
            _ => false,
        };
        carries_text.then(|| TurnContent::from(value))
    }

    /// Plain text form of this content.
    pub fn into_text(self) -> String {
        match self {
            TurnContent::Text(text) => text,
            TurnContent::Structured(value) => match value.get("content") {
                Some(serde_json::Value::String(text)) => text.clone(),
                _ => value.to_string(),
            },
        }
    }
}

impl From<String> for TurnContent {
    fn from(text: String) -> Self {
        TurnContent::Text(text)
    }
}

impl From<&str> for TurnContent {
    fn from(text: &str) -> Self {
        TurnContent::Text(text.to_string())
    }
}

impl From<serde_json::Value> for TurnContent {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => TurnContent::Text(text),
            other => TurnContent::Structured(other),
        }
    }
}

/// Loosely-typed message as held by older session state.
///
/// Accepted when seeding a session and normalized into [`Turn`]s once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyMessage {
    pub role: String,
    pub content: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Response time in seconds.
    #[serde(default)]
    pub response_time: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub error: bool,
}

impl LegacyMessage {
    /// Normalize into a [`Turn`], or `None` when the role or content is unusable.
    pub fn into_turn(self) -> Option<Turn> {
        let role: MessageRole = self.role.parse().ok()?;
        let content = TurnContent::decode(self.content)?;
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_legacy_timestamp)
            .unwrap_or_else(Utc::now);
        let response_time = self
            .response_time
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);

        Some(Turn {
            role,
            content: content.into_text(),
            timestamp,
            response_time,
            model: self.model,
            error: self.error,
        })
    }
}

/// Legacy timestamps are RFC 3339 or naive ISO-8601 local times.
fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Display theme preference for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("invalid theme: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_content_collapses_to_text() {
        let content = TurnContent::from(json!({"content": "hi there", "id": "run-1"}));
        assert_eq!(content.into_text(), "hi there");
    }

    #[test]
    fn test_structured_content_without_text_uses_json() {
        let content = TurnContent::from(json!({"value": 3}));
        assert_eq!(content.into_text(), r#"{"value":3}"#);
    }

    #[test]
    fn test_decode_rejects_textless_values() {
        assert!(TurnContent::decode(json!(42)).is_none());
        assert!(TurnContent::decode(json!({"content": 42})).is_none());
        assert!(TurnContent::decode(json!(null)).is_none());
        assert!(TurnContent::decode(json!("ok")).is_some());
    }

    #[test]
    fn test_legacy_message_normalizes_response_object() {
        let legacy: LegacyMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": {"content": "from a response object"},
            "timestamp": "2025-03-01T10:15:30.123456",
            "response_time": 1.5,
            "model": "llama-3.1-8b-instant"
        }))
        .unwrap();

        let turn = legacy.into_turn().unwrap();
        assert_eq!(turn.role, MessageRole::Assistant);
        assert_eq!(turn.content, "from a response object");
        assert_eq!(turn.response_time, Some(Duration::from_millis(1500)));
        assert_eq!(turn.model.as_deref(), Some("llama-3.1-8b-instant"));
        assert_eq!(turn.timestamp.format("%Y-%m-%d %H:%M").to_string(), "2025-03-01 10:15");
    }

    #[test]
    fn test_legacy_message_with_unknown_role_is_dropped() {
        let legacy: LegacyMessage =
            serde_json::from_value(json!({"role": "tool", "content": "x"})).unwrap();
        assert!(legacy.into_turn().is_none());
    }

    #[test]
    fn test_error_reply_is_flagged() {
        let turn = Turn::error_reply("provider error: boom");
        assert!(turn.error);
        assert_eq!(turn.role, MessageRole::Assistant);
        assert!(turn.content.starts_with("❌ Sorry, I encountered an error"));
        assert!(turn.content.contains("boom"));
        assert!(turn.response_time.is_none());
    }

    #[test]
    fn test_turn_serde_skips_empty_metadata() {
        let turn = Turn::user("hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert!(json.get("response_time").is_none());
        assert!(json.get("model").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::default(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
    }
}
