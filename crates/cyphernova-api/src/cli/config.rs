//! `cyphernova config` -- show where configuration comes from and what it resolves to.

use std::path::Path;

use anyhow::Result;
use console::style;

use cyphernova_infra::config::{render_config, resolve_credential};
use cyphernova_types::config::ChatConfig;
use cyphernova_types::llm::ProviderType;

/// Credential environment variable for a backend, if it needs one.
fn credential_env(config: &ChatConfig, backend: ProviderType) -> Option<&str> {
    match backend {
        ProviderType::Groq => Some(&config.groq.api_key_env),
        ProviderType::HuggingFace => Some(&config.huggingface.api_key_env),
        ProviderType::Ollama => None,
    }
}

pub fn show_config(config: &ChatConfig, data_dir: &Path, config_path: &Path, json: bool) -> Result<()> {
    let credentials: Vec<serde_json::Value> = ProviderType::ALL
        .into_iter()
        .filter_map(|backend| {
            credential_env(config, backend).map(|env_var| {
                serde_json::json!({
                    "backend": backend,
                    "env_var": env_var,
                    "present": resolve_credential(backend, env_var).is_ok(),
                })
            })
        })
        .collect();

    if json {
        let out = serde_json::json!({
            "data_dir": data_dir.display().to_string(),
            "config_file": config_path.display().to_string(),
            "config_file_exists": config_path.exists(),
            "credentials": credentials,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} CypherNova v{}", style("🌸").bold(), env!("CARGO_PKG_VERSION"));
    println!();
    println!("  {}", style("── Paths ──").dim());
    println!("  Data dir:    {}", style(data_dir.display()).cyan());
    let exists = if config_path.exists() {
        style("").green()
    } else {
        style(" (not found, using defaults)").yellow()
    };
    println!("  Config file: {}{exists}", style(config_path.display()).cyan());
    println!();

    println!("  {}", style("── Credentials ──").dim());
    for entry in &credentials {
        let present = entry["present"].as_bool().unwrap_or(false);
        let mark = if present {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "  {mark} {} ({})",
            entry["env_var"].as_str().unwrap_or_default(),
            entry["backend"].as_str().unwrap_or_default()
        );
    }
    println!();

    println!("  {}", style("── Effective config ──").dim());
    for line in render_config(config)?.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
