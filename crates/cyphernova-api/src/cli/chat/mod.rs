//! Interactive CLI chat experience for CypherNova.
//!
//! This module implements the terminal chat loop: streaming or batch model
//! replies with markdown rendering, a thinking spinner, the welcome banner
//! and slash commands. Entry point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
