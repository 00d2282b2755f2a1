//! CLI command definitions for the `cyphernova` binary.
//!
//! Uses clap derive macros for argument parsing. Command-line flags are
//! layered over `config.toml`; see [`ChatOverrides`].

pub mod chat;
pub mod config;
pub mod models;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use cyphernova_types::config::ChatConfig;
use cyphernova_types::llm::ProviderType;

/// Chat with CypherNova from the terminal or over HTTP.
#[derive(Parser)]
#[command(name = "cyphernova", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config.toml (defaults to the data directory).
    #[arg(long, global = true, env = "CYPHERNOVA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session.
    Chat {
        #[command(flatten)]
        overrides: ChatOverrides,

        /// Print replies only once complete.
        #[arg(long)]
        no_stream: bool,
    },

    /// Start the REST API server.
    Serve {
        #[command(flatten)]
        overrides: ChatOverrides,

        /// Port to listen on (defaults to server.port in config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to server.host in config).
        #[arg(long)]
        host: Option<String>,
    },

    /// List the models a backend offers.
    Models {
        /// Backend to list (defaults to the configured one).
        #[arg(long, value_parser = parse_backend)]
        backend: Option<ProviderType>,
    },

    /// Show the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Flags that override `config.toml` for one run.
#[derive(Debug, Default, Clone, Args)]
pub struct ChatOverrides {
    /// Model backend: groq, huggingface or ollama.
    #[arg(short, long, env = "CYPHERNOVA_BACKEND", value_parser = parse_backend)]
    pub backend: Option<ProviderType>,

    /// Model id. For huggingface this is tried before the configured candidates.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0 to 1.0).
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Maximum output tokens.
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

fn parse_backend(raw: &str) -> Result<ProviderType, String> {
    raw.parse()
}

impl ChatOverrides {
    /// Apply the flags to `config`, touching only the selected backend.
    pub fn apply(&self, config: &mut ChatConfig) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }

        match config.backend {
            ProviderType::Groq => {
                let groq = &mut config.groq;
                if let Some(model) = &self.model {
                    groq.model = model.clone();
                }
                if let Some(temperature) = self.temperature {
                    groq.temperature = temperature;
                }
                if let Some(max_tokens) = self.max_tokens {
                    groq.max_tokens = max_tokens;
                }
            }
            ProviderType::HuggingFace => {
                let hf = &mut config.huggingface;
                if let Some(model) = &self.model {
                    hf.candidates.retain(|c| c != model);
                    hf.candidates.insert(0, model.clone());
                }
                if let Some(temperature) = self.temperature {
                    hf.temperature = temperature;
                }
                if let Some(max_tokens) = self.max_tokens {
                    hf.max_tokens = max_tokens;
                }
            }
            ProviderType::Ollama => {
                let ollama = &mut config.ollama;
                if let Some(model) = &self.model {
                    ollama.model = model.clone();
                }
                if let Some(temperature) = self.temperature {
                    ollama.temperature = temperature;
                }
                if let Some(max_tokens) = self.max_tokens {
                    ollama.max_tokens = max_tokens;
                }
            }
        }
    }
}
