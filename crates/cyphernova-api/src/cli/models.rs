//! `cyphernova models` -- list the models a backend can use.

use anyhow::Result;
use console::style;

use cyphernova_types::config::{ChatConfig, GroqConfig};
use cyphernova_types::llm::ProviderType;

/// Models offered for `backend`, in the order they are used.
pub fn models_for(config: &ChatConfig, backend: ProviderType) -> Vec<String> {
    match backend {
        ProviderType::Groq => {
            let mut models: Vec<String> = GroqConfig::MODELS.iter().map(|m| m.to_string()).collect();
            if !models.contains(&config.groq.model) {
                models.insert(0, config.groq.model.clone());
            }
            models
        }
        ProviderType::HuggingFace => config.huggingface.candidates.clone(),
        ProviderType::Ollama => vec![config.ollama.model.clone()],
    }
}

/// The model a fresh session starts on.
fn active_model(config: &ChatConfig, backend: ProviderType) -> Option<&str> {
    match backend {
        ProviderType::Groq => Some(&config.groq.model),
        ProviderType::HuggingFace => config.huggingface.candidates.first().map(String::as_str),
        ProviderType::Ollama => Some(&config.ollama.model),
    }
}

pub fn list_models(config: &ChatConfig, backend: Option<ProviderType>, json: bool) -> Result<()> {
    let backend = backend.unwrap_or(config.backend);
    let models = models_for(config, backend);

    if json {
        let out = serde_json::json!({
            "backend": backend,
            "models": models,
            "fallback_chain": backend == ProviderType::HuggingFace,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let active = active_model(config, backend);
    println!();
    println!("  {} {}", style("Models for").bold(), style(backend).cyan().bold());
    if backend == ProviderType::HuggingFace {
        println!("  {}", style("Tried in order until one answers").dim());
    }
    println!();
    for (i, model) in models.iter().enumerate() {
        let marker = if Some(model.as_str()) == active {
            style("*").green().bold().to_string()
        } else {
            " ".to_string()
        };
        println!("  {marker} {:>2}. {model}", i + 1);
    }
    println!();
    Ok(())
}
