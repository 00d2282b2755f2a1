//! Model backend abstractions for CypherNova.
//!
//! - `LlmProvider`: RPITIT trait for concrete backend implementations
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `ModelGateway`: direct or fallback-chain gateway handed to sessions

pub mod box_provider;
pub mod fallback;
pub mod gateway;
pub mod provider;

#[cfg(test)]
pub(crate) mod mock;
