//! Telegram bot handler tree configuration
//!
//! Updates are converted into transport-free events here; all dialogue logic
//! lives in `crate::conversation`.

mod schema;
mod types;

pub use schema::schema;
pub use types::{event_from_message, inbound_from_callback, inbound_from_message, HandlerDeps, HandlerError};
