//! HTTP/REST API layer for CypherNova.
//!
//! Axum-based REST API at `/api/v1/` with an envelope response format,
//! SSE streaming replies and CORS support.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
