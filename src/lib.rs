//! Matchvote - Telegram bot for football tournament match predictions
//!
//! This library provides all the core functionality for the bot: the SQLite
//! store, the conversational flows (registration, voting, result queries) and
//! the Telegram dispatcher integration.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors and logging
//! - `storage`: database pool and queries
//! - `flows`: transport-independent conversation and voting logic
//! - `telegram`: teloxide handler tree and bot setup

pub mod core;
pub mod flows;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};
