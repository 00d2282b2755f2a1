//! Infrastructure layer for CypherNova.
//!
//! Contains the concrete model backends behind the `LlmProvider` trait
//! defined in `cyphernova-core` (Groq, HuggingFace, Ollama), the factory
//! that turns configuration into a session factory, and config-file,
//! `.env` and credential loading.

pub mod config;
pub mod llm;
