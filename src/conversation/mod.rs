//! Dialogue layer: per-user state, routing and execution.
//!
//! - `state` and `session`: what a user is in the middle of
//! - `event` and `menu`: transport-independent input and keyboards
//! - `machine`: pure routing table
//! - `engine`: applies routed actions through [`Messenger`]

pub mod engine;
pub mod event;
pub mod machine;
pub mod menu;
pub mod outbound;
pub mod session;
pub mod state;

pub use engine::Engine;
pub use event::{Event, Inbound, MessageRef, Selection};
pub use menu::{Keyboard, MenuAction};
pub use outbound::Messenger;
pub use session::SessionStore;
pub use state::{DialogueState, RegistrationStep, Session, SettingsField};
