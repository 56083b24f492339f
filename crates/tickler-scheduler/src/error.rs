//! Error types for the scheduler.

use thiserror::Error;

use crate::JobStatus;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Rejected input, such as an execution time that is not in the future.
    #[error("validation error: {0}")]
    Validation(String),

    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The job's current status does not allow the requested transition.
    #[error("job {id} is {status} and cannot become {requested}")]
    InvalidState {
        id: String,
        status: JobStatus,
        requested: JobStatus,
    },

    /// The scheduler has been shut down and accepts no new jobs.
    #[error("scheduler is shutting down")]
    ShuttingDown,
}
