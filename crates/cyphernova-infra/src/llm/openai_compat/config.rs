//! Configuration and defaults for OpenAI-compatible backends.
//!
//! Groq speaks the OpenAI chat completions protocol, so it is served by the
//! generic [`super::OpenAiCompatibleProvider`] pointed at Groq's base URL.

use secrecy::SecretString;

use cyphernova_types::config::GroqConfig;
use cyphernova_types::llm::{PromptStyle, ProviderCapabilities};

/// Configuration for an OpenAI-compatible backend.
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "groq").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.groq.com/openai/v1").
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used when a request leaves `model` empty.
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

/// Groq cloud configuration.
///
/// Capabilities: streaming, chat-template input; 8K output.
pub fn groq_defaults(api_key: SecretString, config: &GroqConfig) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "groq".into(),
        base_url: config.base_url.clone(),
        api_key,
        model: config.model.clone(),
        capabilities: ProviderCapabilities {
            streaming: true,
            prompt_style: PromptStyle::ChatTemplate,
            max_output_tokens: 8_192,
        },
    }
}
