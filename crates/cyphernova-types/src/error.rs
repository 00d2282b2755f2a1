use thiserror::Error;

use crate::chat::MessageRole;
use crate::llm::LlmError;

/// Errors raised while building the runtime configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing credential for {backend}: set the {env_var} environment variable")]
    MissingCredential { backend: String, env_var: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("failed to initialize backend client: {0}")]
    Client(String),
}

/// Errors from the downstream template step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unescaped '{brace}' at byte {position} opens a template placeholder")]
    UnmatchedBrace { brace: char, position: usize },
}

/// Errors from transcript export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: the conversation only holds the greeting")]
    NothingToExport,

    #[error("failed to serialize export: {0}")]
    Serialization(String),
}

/// Errors surfaced by a chat session to its caller.
///
/// Upstream failures normally become visible error turns; `Upstream` is only
/// returned where no turn can be recorded.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("input is empty")]
    EmptyInput,

    #[error("malformed history: turn {index} has role '{role}'")]
    MalformedHistory { index: usize, role: MessageRole },

    #[error(transparent)]
    Upstream(#[from] LlmError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_names_env_var() {
        let err = ConfigError::MissingCredential {
            backend: "groq".to_string(),
            env_var: "GROQ_API_KEY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing credential for groq: set the GROQ_API_KEY environment variable"
        );
    }

    #[test]
    fn test_malformed_history_display() {
        let err = ChatError::MalformedHistory {
            index: 3,
            role: MessageRole::System,
        };
        assert_eq!(err.to_string(), "malformed history: turn 3 has role 'system'");
    }

    #[test]
    fn test_upstream_is_transparent() {
        let err: ChatError = LlmError::AuthenticationFailed.into();
        assert_eq!(err.to_string(), "authentication failed");
    }
}
