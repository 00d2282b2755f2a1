//! Shared domain types for CypherNova.
//!
//! This crate contains the types used across the CypherNova workspace:
//! chat turns, model request/response shapes, analytics summaries,
//! configuration and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod analytics;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
