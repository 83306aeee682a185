//! Scheduled and on-demand broadcasts.

pub mod broadcast;
pub mod scheduler;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use scheduler::{due_jobs, start_scheduler, Job, Scheduler};
