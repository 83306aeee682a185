//! Telegram bot integration: bot setup, update handlers and the outbound adapter

pub mod bot;
pub mod handlers;
pub mod messenger;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use messenger::TelegramMessenger;
