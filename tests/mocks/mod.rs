//! Mock implementations for integration tests
//!
//! The recording messenger stands in for the Telegram adapter so dialogue,
//! review and broadcast flows run without network access.

pub mod recording_messenger;

#[allow(unused_imports)]
pub use recording_messenger::{RecordingMessenger, Sent};
