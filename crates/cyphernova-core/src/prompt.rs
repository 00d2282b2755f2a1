//! Prompt assembly.
//!
//! Turns the transcript history, the persona instruction and the current user
//! input into the ordered role-tagged messages a backend receives. Two input
//! shapes exist: chat-template backends get brace-escaped messages that a
//! template step renders back, plain-log backends get one conversational
//! log string built by [`plain_log`].

use cyphernova_types::chat::Turn;
use cyphernova_types::error::{ChatError, TemplateError};
use cyphernova_types::llm::{Message, MessageRole, PromptStyle};

/// How much history the assembler includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryWindow {
    #[default]
    Unbounded,
    /// Only the most recent N non-system turns.
    Last(usize),
}

impl From<Option<usize>> for HistoryWindow {
    fn from(limit: Option<usize>) -> Self {
        limit.map_or(HistoryWindow::Unbounded, HistoryWindow::Last)
    }
}

impl HistoryWindow {
    fn select<T>(self, items: &[T]) -> &[T] {
        match self {
            HistoryWindow::Unbounded => items,
            HistoryWindow::Last(n) => &items[items.len().saturating_sub(n)..],
        }
    }
}

/// Builds model input for one backend.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona: String,
    window: HistoryWindow,
    style: PromptStyle,
}

impl PromptAssembler {
    pub fn new(persona: impl Into<String>, window: HistoryWindow, style: PromptStyle) -> Self {
        Self {
            persona: persona.into(),
            window,
            style,
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn window(&self) -> HistoryWindow {
        self.window
    }

    pub fn style(&self) -> PromptStyle {
        self.style
    }

    /// Assemble `[system persona, windowed history..., user input]`.
    ///
    /// `history` must not contain the turn for `input` itself.
    pub fn build(&self, history: &[Turn], input: &str) -> Result<Vec<Message>, ChatError> {
        let conversational: Vec<(usize, &Turn)> = history
            .iter()
            .enumerate()
            .filter(|(_, turn)| turn.role != MessageRole::System)
            .collect();
        let selected = self.window.select(&conversational);

        let mut messages = Vec::with_capacity(selected.len() + 2);
        messages.push(Message::system(self.persona.clone()));
        for (index, turn) in selected {
            let role = chat_role(*index, turn)?;
            messages.push(Message {
                role,
                content: self.prepare(&turn.content),
            });
        }
        messages.push(Message::user(self.prepare(input)));
        Ok(messages)
    }

    fn prepare(&self, content: &str) -> String {
        match self.style {
            PromptStyle::ChatTemplate => escape_braces(content),
            PromptStyle::PlainLog => content.to_string(),
        }
    }
}

/// Role a history turn takes in model input; only user and assistant turns qualify.
pub fn chat_role(index: usize, turn: &Turn) -> Result<MessageRole, ChatError> {
    match turn.role {
        MessageRole::User | MessageRole::Assistant => Ok(turn.role),
        role => Err(ChatError::MalformedHistory { index, role }),
    }
}

/// Double every literal brace so the template step leaves it alone.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// The template step: `{{` becomes `{` and `}}` becomes `}`.
///
/// No variables are bound, so a lone brace is an unresolved placeholder.
pub fn render_template(text: &str) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((position, c)) = chars.next() {
        match c {
            '{' | '}' => {
                if chars.next_if(|(_, next)| *next == c).is_none() {
                    return Err(TemplateError::UnmatchedBrace { brace: c, position });
                }
                rendered.push(c);
            }
            other => rendered.push(other),
        }
    }
    Ok(rendered)
}

/// Render every message through the template step.
pub fn render_messages(messages: &[Message]) -> Result<Vec<Message>, TemplateError> {
    messages
        .iter()
        .map(|message| {
            Ok(Message {
                role: message.role,
                content: render_template(&message.content)?,
            })
        })
        .collect()
}

/// Flatten assembled messages into a conversational log.
///
/// The persona comes first, followed by a blank line, one `User:` or
/// `Assistant:` line per message, and a trailing `Assistant:` cue.
pub fn plain_log(messages: &[Message]) -> String {
    let mut log = String::new();
    for message in messages {
        match message.role {
            MessageRole::System => {
                log.push_str(&message.content);
                log.push_str("\n\n");
            }
            MessageRole::User => {
                log.push_str("User: ");
                log.push_str(&message.content);
                log.push('\n');
            }
            MessageRole::Assistant => {
                log.push_str("Assistant: ");
                log.push_str(&message.content);
                log.push('\n');
            }
        }
    }
    log.push_str("Assistant:");
    log
}
