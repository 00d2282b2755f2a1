//! Multi-model fallback chain.
//!
//! Walks an ordered list of candidate models on a single backend. A model
//! named on the request is tried ahead of the list. The first candidate to
//! return non-blank text wins. Failures and blank replies advance
//! to the next candidate without anything user-visible; once every candidate
//! has failed, one final attempt is made with no explicit model (the backend
//! default) on a smaller output budget. What happens after that is decided by
//! the [`ExhaustionPolicy`].

use std::time::Duration;

use tracing::{Instrument, debug, info_span, warn};

use cyphernova_types::config::{DEFAULT_SILENT_FALLBACK, ExhaustionMode};
use cyphernova_types::llm::{CompletionRequest, LlmError};

use super::box_provider::BoxLlmProvider;
use super::gateway::{GatewayReply, bounded};

/// Model id credited for a silent fallback reply.
pub const FALLBACK_MODEL_ID: &str = "fallback";

/// What the chain does once every attempt has failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Succeed with a generic reply, hiding the failure.
    SilentReply(String),
    /// Return the last upstream error.
    Surface,
}

impl ExhaustionPolicy {
    pub fn from_mode(mode: ExhaustionMode, silent_message: impl Into<String>) -> Self {
        match mode {
            ExhaustionMode::Silent => ExhaustionPolicy::SilentReply(silent_message.into()),
            ExhaustionMode::Surface => ExhaustionPolicy::Surface,
        }
    }
}

impl Default for ExhaustionPolicy {
    fn default() -> Self {
        ExhaustionPolicy::SilentReply(DEFAULT_SILENT_FALLBACK.to_string())
    }
}

/// Ordered candidate models tried against one backend.
///
/// Stateless across calls: every request starts again from the first candidate.
#[derive(Debug)]
pub struct FallbackChain {
    provider: BoxLlmProvider,
    candidates: Vec<String>,
    final_attempt_max_tokens: u32,
    policy: ExhaustionPolicy,
    timeout: Duration,
}

impl FallbackChain {
    pub fn new(provider: BoxLlmProvider, candidates: Vec<String>) -> Self {
        Self {
            provider,
            candidates,
            final_attempt_max_tokens: 400,
            policy: ExhaustionPolicy::default(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_final_attempt_max_tokens(mut self, max_tokens: u32) -> Self {
        self.final_attempt_max_tokens = max_tokens;
        self
    }

    pub fn with_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Upper bound on each individual attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> &BoxLlmProvider {
        &self.provider
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn policy(&self) -> &ExhaustionPolicy {
        &self.policy
    }

    /// Produce a reply, trying each candidate in order.
    pub async fn generate(&self, request: &CompletionRequest) -> Result<GatewayReply, LlmError> {
        let requested = Some(request.model.as_str()).filter(|m| !m.is_empty());
        let order = requested.into_iter().chain(
            self.candidates
                .iter()
                .map(String::as_str)
                .filter(|c| Some(*c) != requested),
        );

        let mut last_error = None;
        for (position, model) in order.enumerate() {
            match self.attempt(&request.with_model(model)).await {
                Ok(reply) => return Ok(reply),
                Err(err) => {
                    debug!(
                        model = %model,
                        position,
                        error = %err,
                        "Candidate model failed, trying next"
                    );
                    last_error = Some(err);
                }
            }
        }

        let default_model = self.provider.default_model();
        let default_tried =
            requested == Some(default_model) || self.candidates.iter().any(|c| c == default_model);
        let result = match last_error {
            // The default already failed as a candidate; asking again changes nothing.
            Some(err) if default_tried => {
                debug!(model = %default_model, "Default model already tried as a candidate");
                Err(err)
            }
            _ => {
                let final_request = CompletionRequest {
                    model: String::new(),
                    max_tokens: self.final_attempt_max_tokens,
                    ..request.clone()
                };
                self.attempt(&final_request).await
            }
        };

        match result {
            Ok(reply) => Ok(reply),
            Err(err) => match &self.policy {
                ExhaustionPolicy::SilentReply(message) => {
                    warn!(
                        backend = self.provider.name(),
                        error = %err,
                        "All candidate models failed, replying with fallback message"
                    );
                    Ok(GatewayReply {
                        text: message.clone(),
                        model: FALLBACK_MODEL_ID.to_string(),
                    })
                }
                ExhaustionPolicy::Surface => {
                    warn!(
                        backend = self.provider.name(),
                        error = %err,
                        "All candidate models failed"
                    );
                    Err(err)
                }
            },
        }
    }

    /// One bounded call; blank text counts as a failure.
    async fn attempt(&self, request: &CompletionRequest) -> Result<GatewayReply, LlmError> {
        let model = self.provider.resolve_model(request).to_string();
        let span = info_span!(
            "chat",
            otel.name = %format!("chat {model}"),
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = %model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.request.stream = false,
        );

        let response = bounded(self.timeout, self.provider.complete(request))
            .instrument(span)
            .await?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse { model });
        }

        Ok(GatewayReply {
            text: text.to_string(),
            model: if response.model.is_empty() {
                model
            } else {
                response.model
            },
        })
    }
}
