//! HuggingFace Inference backend.
//!
//! [`HuggingFaceProvider`] is normally wrapped in a fallback chain that
//! walks several hosted models in order.

pub mod client;
pub mod types;

pub use client::HuggingFaceProvider;
