//! Coursebot - Telegram bot for a paid course
//!
//! Registration dialogue, payment screenshots reviewed by staff, a referral
//! program with tiered discounts, FAQ, question forwarding and scheduled
//! lesson reminders.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, discount engine, health endpoint
//! - `storage`: SQLite pool, migrations and queries
//! - `conversation`: per-user dialogue state machine
//! - `payments`: payment review and the staff question relay
//! - `notifications`: broadcasts and their scheduler
//! - `telegram`: teloxide adapter

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod admin;
pub mod cli;
pub mod conversation;
pub mod core;
pub mod i18n;
pub mod notifications;
pub mod payments;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use conversation::Engine;
pub use core::{config, AppError, AppResult, BotSettings};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
