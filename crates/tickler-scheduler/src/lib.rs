//! In-memory job scheduler for Tickler.
//!
//! This crate provides a volatile scheduler that:
//! - Keeps every job in a single lock-guarded store
//! - Fires each job from its own timer task at its execution time
//! - Resolves cancellation against firing under the store lock, so exactly
//!   one of them wins

mod error;
mod scheduler;
mod store;
mod types;

pub use error::SchedulerError;
pub use scheduler::{DEFAULT_WORK_DURATION, Scheduler, SchedulerConfig};
pub use store::JobStore;
pub use types::{Job, JobId, JobStatus};
