//! Configuration types for CypherNova.
//!
//! `ChatConfig` represents the top-level `config.toml`. Every field has a
//! default matching the stock CypherNova chatbot, so an empty file (or no file
//! at all) yields a working configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::ProviderType;

pub const DEFAULT_GREETING: &str = "CypherNova is HERE! 🌸 How can I help you today?";

pub const DEFAULT_SILENT_FALLBACK: &str =
    "I'm here to help! What specific information are you looking for?";

/// Top-level configuration.
///
/// Loaded from `~/.cyphernova/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Backend used when none is given on the command line.
    #[serde(default = "default_backend")]
    pub backend: ProviderType,

    /// Synthetic assistant turn every transcript starts with.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Upper bound on a single backend call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub groq: GroqConfig,

    #[serde(default)]
    pub huggingface: HuggingFaceConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_backend() -> ProviderType {
    ProviderType::Groq
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            greeting: default_greeting(),
            request_timeout_secs: default_request_timeout_secs(),
            groq: GroqConfig::default(),
            huggingface: HuggingFaceConfig::default(),
            ollama: OllamaConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl ChatConfig {
    /// Check value ranges for every backend section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        validate_sampling("groq", self.groq.temperature, self.groq.max_tokens)?;
        validate_sampling(
            "huggingface",
            self.huggingface.temperature,
            self.huggingface.max_tokens,
        )?;
        validate_sampling("ollama", self.ollama.temperature, self.ollama.max_tokens)?;
        if self.huggingface.candidates.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "huggingface.candidates must not contain blank model ids".to_string(),
            ));
        }
        if self.huggingface.fallback_max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "huggingface.fallback_max_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_sampling(section: &str, temperature: f64, max_tokens: u32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&temperature) {
        return Err(ConfigError::Invalid(format!(
            "{section}.temperature must be within 0.0..=1.0, got {temperature}"
        )));
    }
    if max_tokens == 0 {
        return Err(ConfigError::Invalid(format!(
            "{section}.max_tokens must be positive"
        )));
    }
    Ok(())
}

/// Groq cloud backend (OpenAI-compatible, streaming).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    #[serde(default = "GroqConfig::default_model")]
    pub model: String,
    #[serde(default = "GroqConfig::default_temperature")]
    pub temperature: f64,
    #[serde(default = "GroqConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "GroqConfig::default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "GroqConfig::default_api_key_env")]
    pub api_key_env: String,
    /// Most recent turns sent as history; absent means the whole transcript.
    #[serde(default)]
    pub history_window: Option<usize>,
    #[serde(default = "GroqConfig::default_persona")]
    pub persona: String,
}

impl GroqConfig {
    /// Models offered on Groq's free tier.
    pub const MODELS: [&'static str; 6] = [
        "llama-3.1-8b-instant",
        "llama-3.1-70b-versatile",
        "llama-3.2-1b-preview",
        "llama-3.2-3b-preview",
        "mixtral-8x7b-32768",
        "gemma2-9b-it",
    ];

    fn default_model() -> String {
        Self::MODELS[0].to_string()
    }

    fn default_temperature() -> f64 {
        0.2
    }

    fn default_max_tokens() -> u32 {
        1024
    }

    fn default_base_url() -> String {
        "https://api.groq.com/openai/v1".to_string()
    }

    fn default_api_key_env() -> String {
        "GROQ_API_KEY".to_string()
    }

    fn default_persona() -> String {
        "You are CypherNova Chatbot, a friendly and helpful AI assistant. \
         Always answer warmly and conversationally. Keep responses concise and helpful."
            .to_string()
    }
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            temperature: Self::default_temperature(),
            max_tokens: Self::default_max_tokens(),
            base_url: Self::default_base_url(),
            api_key_env: Self::default_api_key_env(),
            history_window: None,
            persona: Self::default_persona(),
        }
    }
}

/// What the fallback chain does once every candidate has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustionMode {
    /// Reply with `silent_fallback_message` as if the call succeeded.
    #[default]
    Silent,
    /// Report the last backend error to the caller.
    Surface,
}

/// HuggingFace Inference backend (multi-model fallback chain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuggingFaceConfig {
    /// Candidate models, tried in order.
    #[serde(default = "HuggingFaceConfig::default_candidates")]
    pub candidates: Vec<String>,
    /// Model used for the final attempt that names no candidate.
    #[serde(default = "HuggingFaceConfig::default_model")]
    pub default_model: String,
    #[serde(default = "HuggingFaceConfig::default_temperature")]
    pub temperature: f64,
    #[serde(default = "HuggingFaceConfig::default_max_tokens")]
    pub max_tokens: u32,
    /// Output budget for the final no-candidate attempt.
    #[serde(default = "HuggingFaceConfig::default_fallback_max_tokens")]
    pub fallback_max_tokens: u32,
    #[serde(default = "HuggingFaceConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "HuggingFaceConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "HuggingFaceConfig::default_history_window")]
    pub history_window: Option<usize>,
    #[serde(default = "HuggingFaceConfig::default_persona")]
    pub persona: String,
    #[serde(default)]
    pub on_exhaustion: ExhaustionMode,
    #[serde(default = "HuggingFaceConfig::default_silent_fallback_message")]
    pub silent_fallback_message: String,
}

impl HuggingFaceConfig {
    fn default_candidates() -> Vec<String> {
        [
            "mistralai/Mistral-7B-Instruct-v0.3",
            "mistralai/Mistral-7B-Instruct-v0.2",
            "HuggingFaceH4/zephyr-7b-beta",
            "google/gemma-7b-it",
            "meta-llama/Llama-2-7b-chat-hf",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    /// Kept out of `default_candidates` so the final attempt asks a new model.
    fn default_model() -> String {
        "microsoft/Phi-3-mini-4k-instruct".to_string()
    }

    fn default_temperature() -> f64 {
        0.7
    }

    fn default_max_tokens() -> u32 {
        500
    }

    fn default_fallback_max_tokens() -> u32 {
        400
    }

    fn default_base_url() -> String {
        "https://api-inference.huggingface.co".to_string()
    }

    fn default_api_key_env() -> String {
        "HF_API_TOKEN".to_string()
    }

    fn default_history_window() -> Option<usize> {
        Some(6)
    }

    fn default_persona() -> String {
        "You are CypherNova, a helpful and intelligent AI assistant. \
         Provide detailed, accurate, and helpful responses."
            .to_string()
    }

    fn default_silent_fallback_message() -> String {
        DEFAULT_SILENT_FALLBACK.to_string()
    }
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            candidates: Self::default_candidates(),
            default_model: Self::default_model(),
            temperature: Self::default_temperature(),
            max_tokens: Self::default_max_tokens(),
            fallback_max_tokens: Self::default_fallback_max_tokens(),
            base_url: Self::default_base_url(),
            api_key_env: Self::default_api_key_env(),
            history_window: Self::default_history_window(),
            persona: Self::default_persona(),
            on_exhaustion: ExhaustionMode::default(),
            silent_fallback_message: Self::default_silent_fallback_message(),
        }
    }
}

/// Local Ollama server backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "OllamaConfig::default_model")]
    pub model: String,
    #[serde(default = "OllamaConfig::default_temperature")]
    pub temperature: f64,
    #[serde(default = "OllamaConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "OllamaConfig::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub history_window: Option<usize>,
    #[serde(default = "OllamaConfig::default_persona")]
    pub persona: String,
}

impl OllamaConfig {
    fn default_model() -> String {
        "llama3.2".to_string()
    }

    fn default_temperature() -> f64 {
        0.2
    }

    fn default_max_tokens() -> u32 {
        1024
    }

    fn default_base_url() -> String {
        "http://localhost:11434".to_string()
    }

    fn default_persona() -> String {
        "You are CypherNova Chatbot, a friendly and helpful AI assistant. \
         Always answer warmly and conversationally."
            .to_string()
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            temperature: Self::default_temperature(),
            max_tokens: Self::default_max_tokens(),
            base_url: Self::default_base_url(),
            history_window: None,
            persona: Self::default_persona(),
        }
    }
}

/// HTTP server settings for `cyphernova serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8501
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}
