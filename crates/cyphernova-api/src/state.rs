//! Shared state for the REST API.
//!
//! Sessions live in memory, keyed by id. Each session sits behind its own
//! async mutex: a turn holds the lock from start to finish, so one session
//! runs one turn at a time while different sessions proceed concurrently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use cyphernova_core::session::{ChatSession, GenerationOverrides, SessionFactory};
use cyphernova_core::transcript::Transcript;
use cyphernova_types::chat::LegacyMessage;
use cyphernova_types::error::ConfigError;

pub type SharedSession = Arc<Mutex<ChatSession>>;

#[derive(Clone)]
pub struct AppState {
    pub factory: Arc<SessionFactory>,
    sessions: Arc<DashMap<Uuid, SharedSession>>,
}

impl AppState {
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            factory: Arc::new(factory),
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Open a session, optionally seeded from older session state and with
    /// its own sampling parameters.
    pub fn create_session(
        &self,
        history: Option<Vec<LegacyMessage>>,
        overrides: &GenerationOverrides,
    ) -> Result<(Uuid, SharedSession), ConfigError> {
        let generation = overrides.apply(&self.factory.settings().generation)?;
        let session = match history {
            Some(messages) => {
                let greeting = self.factory.settings().greeting.clone();
                self.factory
                    .resume(Transcript::from_legacy(greeting, messages))
            }
            None => self.factory.create(),
        }
        .with_generation(generation);
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(id, shared.clone());
        tracing::debug!(session_id = %id, "Session created");
        Ok((id, shared))
    }

    pub fn session(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Drop a session. In-flight turns finish on their own handle.
    pub fn remove_session(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A local stand-in backend for handler and state tests.

    use std::pin::Pin;
    use std::time::Duration;

    use futures_util::Stream;

    use cyphernova_core::llm::box_provider::BoxLlmProvider;
    use cyphernova_core::llm::gateway::{DirectGateway, ModelGateway};
    use cyphernova_core::llm::provider::LlmProvider;
    use cyphernova_core::prompt::{HistoryWindow, PromptAssembler};
    use cyphernova_core::session::{GenerationSettings, SessionFactory, SessionSettings};
    use cyphernova_types::llm::{
        CompletionRequest, CompletionResponse, LlmError, MessageRole, PromptStyle,
        ProviderCapabilities, StreamEvent, Usage,
    };

    use super::AppState;

    /// Replies "echo: <last user message>", or fails when asked to.
    pub struct EchoProvider {
        capabilities: ProviderCapabilities,
    }

    impl EchoProvider {
        fn reply_for(request: &CompletionRequest) -> Result<String, LlmError> {
            let last = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            if last.contains("fail") {
                return Err(LlmError::Provider {
                    message: "backend unavailable".to_string(),
                });
            }
            Ok(format!("echo: {last}"))
        }
    }

    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn capabilities(&self) -> &ProviderCapabilities {
            &self.capabilities
        }

        fn default_model(&self) -> &str {
            "echo-1"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: Self::reply_for(request)?,
                model: "echo-1".to_string(),
                usage: Usage::default(),
            })
        }

        fn stream(
            &self,
            request: CompletionRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
            let reply = Self::reply_for(&request);
            Box::pin(async_stream::try_stream! {
                let reply = reply?;
                for word in reply.split_inclusive(' ') {
                    yield StreamEvent::TextDelta { text: word.to_string() };
                }
                yield StreamEvent::Done;
            })
        }
    }

    pub fn echo_state() -> AppState {
        let provider = BoxLlmProvider::new(EchoProvider {
            capabilities: ProviderCapabilities {
                streaming: true,
                prompt_style: PromptStyle::ChatTemplate,
                max_output_tokens: 256,
            },
        });
        let gateway = ModelGateway::Direct(DirectGateway::new(provider, Duration::from_secs(5)));
        let settings = SessionSettings {
            greeting: "Hi there!".to_string(),
            assembler: PromptAssembler::new(
                "You are helpful.",
                HistoryWindow::Unbounded,
                PromptStyle::ChatTemplate,
            ),
            generation: GenerationSettings {
                model: String::new(),
                temperature: 0.2,
                max_tokens: 256,
            },
        };
        AppState::new(SessionFactory::new(std::sync::Arc::new(gateway), settings))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::echo_state;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_remove_session() {
        let state = echo_state();
        let (id, session) = state
            .create_session(None, &GenerationOverrides::default())
            .unwrap();
        assert_eq!(state.session_count(), 1);
        assert_eq!(session.lock().await.transcript().len(), 1);
        assert!(state.session(&id).is_some());

        assert!(state.remove_session(&id));
        assert!(!state.remove_session(&id));
        assert!(state.session(&id).is_none());
    }

    #[tokio::test]
    async fn test_create_session_from_legacy_history() {
        let state = echo_state();
        let history: Vec<LegacyMessage> = serde_json::from_value(json!([
            {"role": "assistant", "content": "Hi there!"},
            {"role": "user", "content": "hello"},
            {"role": "assistant", "content": {"content": "structured hello"}}
        ]))
        .unwrap();

        let (_, session) = state
            .create_session(Some(history), &GenerationOverrides::default())
            .unwrap();
        let session = session.lock().await;
        let turns = session.transcript().all();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].content, "structured hello");

        let summary = session.summary();
        assert_eq!(summary.total_messages, 2);
        assert_eq!(summary.user_messages, 1);
        assert_eq!(summary.bot_messages, 1);
    }

    #[tokio::test]
    async fn test_create_session_applies_overrides() {
        let state = echo_state();
        let overrides = GenerationOverrides {
            model: Some("echo-2".to_string()),
            temperature: Some(0.9),
            max_tokens: Some(64),
        };
        let (_, session) = state.create_session(None, &overrides).unwrap();
        let session = session.lock().await;
        assert_eq!(session.generation().model, "echo-2");
        assert_eq!(session.generation().max_tokens, 64);

        let bad = GenerationOverrides {
            temperature: Some(2.0),
            ..Default::default()
        };
        assert!(state.create_session(None, &bad).is_err());
        assert_eq!(state.session_count(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let state = echo_state();
        let defaults = GenerationOverrides::default();
        let (_, a) = state.create_session(None, &defaults).unwrap();
        let (_, b) = state.create_session(None, &defaults).unwrap();

        a.lock().await.submit("hello").await.unwrap();
        assert_eq!(a.lock().await.transcript().len(), 3);
        assert_eq!(b.lock().await.transcript().len(), 1);
    }
}
