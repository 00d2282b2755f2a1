//! Transcript store: the ordered, append-only turn log of one session.

use cyphernova_types::chat::{LegacyMessage, MessageRole, Turn, TurnContent};

/// Ordered turns of one conversation.
///
/// Always starts with the synthetic assistant greeting and is never empty.
#[derive(Debug, Clone)]
pub struct Transcript {
    greeting: String,
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Self {
            turns: vec![Turn::assistant(greeting.as_str())],
            greeting,
        }
    }

    /// Rebuild a transcript from older, loosely-typed session state.
    ///
    /// Messages that cannot be normalized are dropped. A history that does
    /// not open with an assistant turn gets the greeting in front of it.
    pub fn from_legacy(
        greeting: impl Into<String>,
        messages: impl IntoIterator<Item = LegacyMessage>,
    ) -> Self {
        let mut transcript = Self::new(greeting);
        let mut turns = messages
            .into_iter()
            .filter_map(LegacyMessage::into_turn)
            .peekable();
        if turns.peek().is_some_and(|t| t.role == MessageRole::Assistant) {
            transcript.turns.clear();
        }
        transcript.turns.extend(turns);
        transcript
    }

    /// Turns after the opening greeting.
    pub fn conversation(&self) -> &[Turn] {
        self.turns.get(1..).unwrap_or_default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Decode `content` to text and append it as a new turn.
    pub fn append_content(&mut self, role: MessageRole, content: impl Into<TurnContent>) {
        self.append(Turn::new(role, content));
    }

    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    /// Every turn except the most recent one.
    pub fn history_before_last(&self) -> &[Turn] {
        &self.turns[..self.turns.len().saturating_sub(1)]
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the greeting is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Whether anything beyond the opening greeting has been said.
    pub fn has_conversation(&self) -> bool {
        self.turns.len() > 1
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Drop every turn and reinstate the greeting.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.turns.push(Turn::assistant(self.greeting.as_str()));
    }
}
