//! Configuration loader for CypherNova.
//!
//! Reads `config.toml` from the data directory (`~/.cyphernova/` unless
//! `CYPHERNOVA_DATA_DIR` says otherwise) and deserializes it into
//! [`ChatConfig`]. Falls back to defaults when the file is missing or
//! malformed. Credentials never live in the file: they come from the
//! environment (optionally seeded from a `.env` file).

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use cyphernova_types::config::ChatConfig;
use cyphernova_types::error::ConfigError;
use cyphernova_types::llm::ProviderType;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CYPHERNOVA_DATA_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory: `$CYPHERNOVA_DATA_DIR`, else `~/.cyphernova`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cyphernova")
}

/// `{data_dir}/config.toml`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load `.env` from the working directory or any parent, if present.
///
/// Variables already set in the environment win.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(err) if err.not_found() => None,
        Err(err) => {
            tracing::warn!("Failed to load .env: {err}");
            None
        }
    }
}

/// Read and parse a config file.
///
/// Returns `Ok(None)` when the file does not exist.
pub async fn read_config_file(path: &Path) -> Result<Option<ChatConfig>, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigError::Parse {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    toml::from_str::<ChatConfig>(&content)
        .map(Some)
        .map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })
}

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`ChatConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
///
/// Range checks are left to [`ChatConfig::validate`], which runs once all
/// command-line overrides are applied.
pub async fn load_config(path: &Path) -> ChatConfig {
    match read_config_file(path).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            ChatConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            ChatConfig::default()
        }
    }
}

/// Render a config back to TOML, e.g. for `cyphernova config`.
pub fn render_config(config: &ChatConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::Invalid(e.to_string()))
}

/// Read a backend credential from the environment.
pub fn resolve_credential(backend: ProviderType, env_var: &str) -> Result<SecretString, ConfigError> {
    resolve_credential_with(backend, env_var, |name| std::env::var(name).ok())
}

/// [`resolve_credential`] against an arbitrary lookup. Blank values count as missing.
pub fn resolve_credential_with(
    backend: ProviderType,
    env_var: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    match lookup(env_var) {
        Some(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim().to_string())),
        _ => Err(ConfigError::MissingCredential {
            backend: backend.to_string(),
            env_var: env_var.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyphernova_types::config::ExhaustionMode;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&config_path(tmp.path())).await;
        assert_eq!(config.backend, ProviderType::Groq);
        assert_eq!(config.server.port, 8501);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(tmp.path());
        tokio::fs::write(
            &path,
            r#"
backend = "huggingface"
greeting = "Hello!"

[huggingface]
candidates = ["a/one", "b/two"]
on_exhaustion = "surface"
"#,
        )
        .await
        .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.backend, ProviderType::HuggingFace);
        assert_eq!(config.greeting, "Hello!");
        assert_eq!(config.huggingface.candidates, vec!["a/one", "b/two"]);
        assert_eq!(config.huggingface.on_exhaustion, ExhaustionMode::Surface);
        // Unspecified fields keep their defaults.
        assert_eq!(config.huggingface.fallback_max_tokens, 400);
    }

    #[tokio::test]
    async fn load_config_malformed_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(tmp.path());
        tokio::fs::write(&path, "backend = [not valid").await.unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.backend, ProviderType::Groq);

        let err = read_config_file(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn read_config_file_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(read_config_file(&tmp.path().join("nope.toml")).await.unwrap().is_none());
    }

    #[test]
    fn render_config_roundtrips() {
        let rendered = render_config(&ChatConfig::default()).unwrap();
        let parsed: ChatConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.backend, ProviderType::Groq);
        assert_eq!(parsed.huggingface.candidates.len(), 5);
    }

    #[test]
    fn resolve_credential_found() {
        let secret = resolve_credential_with(ProviderType::Groq, "GROQ_API_KEY", |name| {
            (name == "GROQ_API_KEY").then(|| " gsk-test \n".to_string())
        })
        .unwrap();
        assert_eq!(secret.expose_secret(), "gsk-test");
    }

    #[test]
    fn resolve_credential_blank_is_missing() {
        let err = resolve_credential_with(ProviderType::HuggingFace, "HF_API_TOKEN", |_| {
            Some("   ".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("HF_API_TOKEN"));
    }

    #[test]
    fn resolve_credential_absent_is_missing() {
        let err = resolve_credential_with(ProviderType::Groq, "GROQ_API_KEY", |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
    }
}
