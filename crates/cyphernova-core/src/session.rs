//! Chat session: the per-conversation orchestrator.
//!
//! A `ChatSession` owns one transcript, its analytics, the prompt assembler
//! and the theme flag, and shares a read-only handle to the model gateway.
//! Each user turn runs linearly: validate input, assemble the prompt from the
//! existing history, append the user turn, call the gateway, append the
//! assistant (or error) turn, update analytics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use cyphernova_types::analytics::AnalyticsSummary;
use cyphernova_types::chat::{Theme, Turn};
use cyphernova_types::error::{ChatError, ConfigError};
use cyphernova_types::llm::{CompletionRequest, LlmError};

use crate::analytics::SessionAnalytics;
use crate::export::{self, ExportDocument, ExportFormat};
use crate::llm::gateway::{GatewayReply, ModelGateway};
use crate::prompt::PromptAssembler;
use crate::transcript::Transcript;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Empty means the backend default.
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Per-session changes to the factory's sampling parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerationOverrides {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl GenerationOverrides {
    /// `base` with every present override applied, range-checked like the config file.
    pub fn apply(&self, base: &GenerationSettings) -> Result<GenerationSettings, ConfigError> {
        let mut settings = base.clone();
        if let Some(model) = &self.model {
            let model = model.trim();
            if model.is_empty() {
                return Err(ConfigError::Invalid("model must not be blank".to_string()));
            }
            settings.model = model.to_string();
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ConfigError::Invalid(format!(
                    "temperature must be within 0.0..=1.0, got {temperature}"
                )));
            }
            settings.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
            }
            settings.max_tokens = max_tokens;
        }
        Ok(settings)
    }
}

/// Everything needed to open a session against one backend.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub greeting: String,
    pub assembler: PromptAssembler,
    pub generation: GenerationSettings,
}

/// Creates sessions that share one gateway.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    gateway: Arc<ModelGateway>,
    settings: SessionSettings,
}

impl SessionFactory {
    pub fn new(gateway: Arc<ModelGateway>, settings: SessionSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        &self.gateway
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn create(&self) -> ChatSession {
        ChatSession::new(self.gateway.clone(), self.settings.clone())
    }

    /// Open a session seeded with an existing transcript.
    ///
    /// Analytics are rebuilt from the seeded turns, timed from the greeting.
    pub fn resume(&self, transcript: Transcript) -> ChatSession {
        let mut session = self.create();
        let session_start = transcript.all().first().map_or_else(Utc::now, |t| t.timestamp);
        session.analytics = SessionAnalytics::replay(transcript.conversation(), session_start);
        session.transcript = transcript;
        session
    }
}

/// Result of one user turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant turn that was appended.
    pub reply: Turn,
    /// True when the reply reports an upstream failure.
    pub error: bool,
    pub response_time: Option<Duration>,
}

/// One user's conversation.
pub struct ChatSession {
    id: Uuid,
    transcript: Transcript,
    analytics: SessionAnalytics,
    assembler: PromptAssembler,
    generation: GenerationSettings,
    gateway: Arc<ModelGateway>,
    theme: Theme,
}

impl ChatSession {
    pub fn new(gateway: Arc<ModelGateway>, settings: SessionSettings) -> Self {
        Self {
            id: Uuid::now_v7(),
            transcript: Transcript::new(settings.greeting),
            analytics: SessionAnalytics::new(),
            assembler: settings.assembler,
            generation: settings.generation,
            gateway,
            theme: Theme::default(),
        }
    }

    /// Replace the sampling parameters this session sends.
    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn analytics(&self) -> &SessionAnalytics {
        &self.analytics
    }

    pub fn summary(&self) -> AnalyticsSummary {
        self.analytics.summary()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    pub fn generation(&self) -> &GenerationSettings {
        &self.generation
    }

    /// Model name shown to the user: the configured model or the backend name.
    pub fn model_label(&self) -> &str {
        if self.generation.model.is_empty() {
            self.gateway.name()
        } else {
            &self.generation.model
        }
    }

    /// Run one batch turn.
    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome, ChatError> {
        let request = self.begin_turn(input, false)?;
        let started = Instant::now();
        let result = self.gateway.generate(&request).await;
        Ok(self.finish_turn(result, started.elapsed()))
    }

    /// Run one streaming turn, handing each fragment to `on_fragment` as it arrives.
    ///
    /// A failure part-way through discards the partial text and records an
    /// error turn instead.
    pub async fn submit_streaming<F>(
        &mut self,
        input: &str,
        mut on_fragment: F,
    ) -> Result<TurnOutcome, ChatError>
    where
        F: FnMut(&str),
    {
        let request = self.begin_turn(input, true)?;
        let started = Instant::now();

        let result = match self.gateway.generate_stream(request).await {
            Ok(mut stream) => {
                let mut text = String::new();
                let mut failure = None;
                while let Some(fragment) = stream.fragments.next().await {
                    match fragment {
                        Ok(fragment) => {
                            on_fragment(&fragment);
                            text.push_str(&fragment);
                        }
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                match failure {
                    Some(err) => Err(err),
                    None => Ok(GatewayReply {
                        text,
                        model: stream.model,
                    }),
                }
            }
            Err(err) => Err(err),
        };

        Ok(self.finish_turn(result, started.elapsed()))
    }

    /// Validate input, build the request and record the user turn.
    fn begin_turn(&mut self, input: &str, stream: bool) -> Result<CompletionRequest, ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let messages = self.assembler.build(self.transcript.all(), input)?;
        self.transcript.append(Turn::user(input));
        self.analytics.record_user_turn();

        Ok(CompletionRequest {
            model: self.generation.model.clone(),
            messages,
            max_tokens: self.generation.max_tokens,
            temperature: Some(self.generation.temperature),
            stream,
        })
    }

    fn finish_turn(
        &mut self,
        result: Result<GatewayReply, LlmError>,
        elapsed: Duration,
    ) -> TurnOutcome {
        let outcome = match result {
            Ok(reply) => {
                info!(
                    session_id = %self.id,
                    model = %reply.model,
                    response_time_ms = elapsed.as_millis() as u64,
                    "Turn completed"
                );
                self.analytics.record_bot_turn(elapsed, &reply.model);
                TurnOutcome {
                    reply: Turn::reply(reply.text, elapsed, reply.model),
                    error: false,
                    response_time: Some(elapsed),
                }
            }
            Err(err) => {
                warn!(
                    session_id = %self.id,
                    backend = self.gateway.name(),
                    error = %err,
                    "Upstream failure, recording error turn"
                );
                self.analytics.record_error_turn();
                TurnOutcome {
                    reply: Turn::error_reply(&err),
                    error: true,
                    response_time: None,
                }
            }
        };
        self.transcript.append(outcome.reply.clone());
        outcome
    }

    /// Reinstate the greeting and reset analytics together.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.analytics.reset();
    }

    pub fn export(&self, format: ExportFormat) -> Result<ExportDocument, ChatError> {
        let document = export::export(
            format,
            self.transcript.all(),
            &self.analytics.summary(),
            self.model_label(),
            Local::now(),
        )?;
        Ok(document)
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("turns", &self.transcript.len())
            .field("backend", &self.gateway.name())
            .field("theme", &self.theme)
            .finish()
    }
}
