//! Conversation orchestration for CypherNova.
//!
//! This crate holds the conversation semantics: the transcript store, prompt
//! assembly, the model gateway contract and its fallback chain, analytics,
//! export and the `ChatSession` that ties them together. It depends only on
//! `cyphernova-types` -- concrete backends live in `cyphernova-infra`.

pub mod analytics;
pub mod export;
pub mod llm;
pub mod prompt;
pub mod session;
pub mod transcript;
