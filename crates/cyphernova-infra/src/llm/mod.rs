//! Model backend implementations.
//!
//! Contains concrete implementations of the [`LlmProvider`] trait defined in
//! `cyphernova-core`: Groq through its OpenAI-compatible API, the HuggingFace
//! Inference API, and a local Ollama server.
//!
//! Also provides the factory functions that turn a [`ChatConfig`] into a
//! ready-to-use [`SessionFactory`]: [`create_provider`] builds the backend,
//! [`build_gateway`] wraps it in the right gateway, and
//! [`build_session_factory`] resolves credentials and ties it all together.
//!
//! [`LlmProvider`]: cyphernova_core::llm::provider::LlmProvider

pub mod huggingface;
pub mod ollama;
pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use cyphernova_core::llm::box_provider::BoxLlmProvider;
use cyphernova_core::llm::fallback::{ExhaustionPolicy, FallbackChain};
use cyphernova_core::llm::gateway::{DirectGateway, ModelGateway};
use cyphernova_core::prompt::{HistoryWindow, PromptAssembler};
use cyphernova_core::session::{GenerationSettings, SessionFactory, SessionSettings};
use cyphernova_types::config::ChatConfig;
use cyphernova_types::error::ConfigError;
use cyphernova_types::llm::{CompletionRequest, LlmError, Message, ProviderType};

use self::huggingface::HuggingFaceProvider;
use self::ollama::OllamaProvider;
use self::openai_compat::OpenAiCompatibleProvider;
use crate::config::resolve_credential;

const USER_AGENT: &str = concat!("cyphernova/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for the reqwest-based backends.
pub(crate) fn build_http_client() -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| LlmError::Provider {
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// Map a non-success HTTP status to an [`LlmError`].
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {body}"),
        },
    }
}

/// Create a [`BoxLlmProvider`] for the configured backend.
///
/// Groq and HuggingFace need an API key; Ollama ignores it.
pub fn create_provider(
    config: &ChatConfig,
    api_key: Option<SecretString>,
) -> Result<BoxLlmProvider, ConfigError> {
    let missing = |env_var: &str| ConfigError::MissingCredential {
        backend: config.backend.to_string(),
        env_var: env_var.to_string(),
    };

    match config.backend {
        ProviderType::Groq => {
            let key = api_key.ok_or_else(|| missing(&config.groq.api_key_env))?;
            let provider = OpenAiCompatibleProvider::groq(key, &config.groq);
            Ok(BoxLlmProvider::new(provider))
        }
        ProviderType::HuggingFace => {
            let key = api_key.ok_or_else(|| missing(&config.huggingface.api_key_env))?;
            let provider = HuggingFaceProvider::new(key, &config.huggingface)
                .map_err(|e| ConfigError::Client(e.to_string()))?;
            Ok(BoxLlmProvider::new(provider))
        }
        ProviderType::Ollama => {
            let provider = OllamaProvider::new(&config.ollama)
                .map_err(|e| ConfigError::Client(e.to_string()))?;
            Ok(BoxLlmProvider::new(provider))
        }
    }
}

/// Wrap a provider in the gateway its backend calls for.
///
/// HuggingFace walks its candidate list through a [`FallbackChain`]; the
/// other backends are called directly.
pub fn build_gateway(config: &ChatConfig, provider: BoxLlmProvider) -> ModelGateway {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    match config.backend {
        ProviderType::HuggingFace => {
            let hf = &config.huggingface;
            let policy = ExhaustionPolicy::from_mode(hf.on_exhaustion, &hf.silent_fallback_message);
            ModelGateway::Fallback(
                FallbackChain::new(provider, hf.candidates.clone())
                    .with_final_attempt_max_tokens(hf.fallback_max_tokens)
                    .with_policy(policy)
                    .with_timeout(timeout),
            )
        }
        ProviderType::Groq | ProviderType::Ollama => {
            ModelGateway::Direct(DirectGateway::new(provider, timeout))
        }
    }
}

/// Session settings for the configured backend.
pub fn session_settings(config: &ChatConfig, gateway: &ModelGateway) -> SessionSettings {
    let (persona, window, generation) = match config.backend {
        ProviderType::Groq => {
            let groq = &config.groq;
            (
                groq.persona.as_str(),
                groq.history_window,
                GenerationSettings {
                    model: groq.model.clone(),
                    temperature: groq.temperature,
                    max_tokens: groq.max_tokens,
                },
            )
        }
        ProviderType::HuggingFace => {
            let hf = &config.huggingface;
            (
                hf.persona.as_str(),
                hf.history_window,
                GenerationSettings {
                    // The chain picks the model per attempt.
                    model: String::new(),
                    temperature: hf.temperature,
                    max_tokens: hf.max_tokens,
                },
            )
        }
        ProviderType::Ollama => {
            let ollama = &config.ollama;
            (
                ollama.persona.as_str(),
                ollama.history_window,
                GenerationSettings {
                    model: ollama.model.clone(),
                    temperature: ollama.temperature,
                    max_tokens: ollama.max_tokens,
                },
            )
        }
    };

    SessionSettings {
        greeting: config.greeting.clone(),
        assembler: PromptAssembler::new(
            persona,
            HistoryWindow::from(window),
            gateway.prompt_style(),
        ),
        generation,
    }
}

/// Validate the config, resolve credentials and build a [`SessionFactory`].
///
/// A missing credential is fatal here, before any session exists.
pub fn build_session_factory(config: &ChatConfig) -> Result<SessionFactory, ConfigError> {
    config.validate()?;

    let api_key = match config.backend {
        ProviderType::Groq => Some(resolve_credential(config.backend, &config.groq.api_key_env)?),
        ProviderType::HuggingFace => Some(resolve_credential(
            config.backend,
            &config.huggingface.api_key_env,
        )?),
        ProviderType::Ollama => None,
    };

    let provider = create_provider(config, api_key)?;
    Ok(factory_for(config, provider))
}

/// Assemble a factory around an already-built provider.
pub fn factory_for(config: &ChatConfig, provider: BoxLlmProvider) -> SessionFactory {
    let gateway = build_gateway(config, provider);
    let settings = session_settings(config, &gateway);
    tracing::info!(
        backend = %config.backend,
        provider = gateway.name(),
        streaming = gateway.supports_streaming(),
        "model gateway ready"
    );
    SessionFactory::new(Arc::new(gateway), settings)
}

/// Send a minimal request to verify the backend answers.
pub async fn test_provider_connection(provider: &BoxLlmProvider) -> Result<(), LlmError> {
    let request = CompletionRequest {
        model: String::new(),
        messages: vec![Message::user("Hello")],
        max_tokens: 10,
        temperature: Some(0.0),
        stream: false,
    };
    provider.complete(&request).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyphernova_types::llm::PromptStyle;

    fn config_for(backend: ProviderType) -> ChatConfig {
        ChatConfig {
            backend,
            ..ChatConfig::default()
        }
    }

    fn key() -> Option<SecretString> {
        Some(SecretString::from("test-key".to_string()))
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(reqwest::StatusCode::UNAUTHORIZED, String::new()),
            LlmError::AuthenticationFailed
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new()),
            LlmError::RateLimited { .. }
        ));
        let err = status_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "loading".to_string());
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("loading"));
    }

    #[test]
    fn test_create_provider_groq() {
        let provider = create_provider(&config_for(ProviderType::Groq), key()).unwrap();
        assert_eq!(provider.name(), "groq");
        assert_eq!(provider.capabilities().prompt_style, PromptStyle::ChatTemplate);
    }

    #[test]
    fn test_create_provider_requires_key() {
        let err = create_provider(&config_for(ProviderType::HuggingFace), None).unwrap_err();
        match err {
            ConfigError::MissingCredential { backend, env_var } => {
                assert_eq!(backend, "huggingface");
                assert_eq!(env_var, "HF_API_TOKEN");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_create_provider_ollama_needs_no_key() {
        let provider = create_provider(&config_for(ProviderType::Ollama), None).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_huggingface_gets_fallback_chain() {
        let config = config_for(ProviderType::HuggingFace);
        let provider = create_provider(&config, key()).unwrap();
        let gateway = build_gateway(&config, provider);
        match &gateway {
            ModelGateway::Fallback(chain) => {
                assert_eq!(chain.candidates().len(), 5);
                assert!(matches!(chain.policy(), ExhaustionPolicy::SilentReply(_)));
            }
            ModelGateway::Direct(_) => panic!("expected fallback chain"),
        }
        assert!(!gateway.supports_streaming());
    }

    #[test]
    fn test_session_settings_follow_backend() {
        let config = config_for(ProviderType::HuggingFace);
        let provider = create_provider(&config, key()).unwrap();
        let factory = factory_for(&config, provider);
        let settings = factory.settings();
        assert_eq!(settings.assembler.style(), PromptStyle::PlainLog);
        assert_eq!(settings.assembler.window(), HistoryWindow::Last(6));
        assert!(settings.generation.model.is_empty());
        assert_eq!(settings.generation.max_tokens, 500);

        let config = config_for(ProviderType::Groq);
        let provider = create_provider(&config, key()).unwrap();
        let factory = factory_for(&config, provider);
        let settings = factory.settings();
        assert_eq!(settings.assembler.style(), PromptStyle::ChatTemplate);
        assert_eq!(settings.assembler.window(), HistoryWindow::Unbounded);
        assert_eq!(settings.generation.model, config.groq.model);
    }

    #[test]
    fn test_build_session_factory_rejects_invalid_config() {
        let mut config = config_for(ProviderType::Ollama);
        config.ollama.temperature = 1.5;
        assert!(matches!(
            build_session_factory(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_build_session_factory_ollama() {
        let factory = build_session_factory(&config_for(ProviderType::Ollama)).unwrap();
        let session = factory.create();
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(factory.gateway().name(), "ollama");
    }
}
