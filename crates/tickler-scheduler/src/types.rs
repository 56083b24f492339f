//! Scheduler types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SchedulerError;

/// Unique job identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SchedulerError::JobNotFound(s.to_string()))
    }
}

/// A scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier, assigned at creation.
    pub id: JobId,
    /// Free-form text supplied by the caller.
    pub description: String,
    /// When this job should fire.
    pub execute_at: DateTime<Utc>,
    /// Current status of the job.
    pub status: JobStatus,
    /// When this job finished executing. Set only in [`JobStatus::Executed`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

/// Current status of a job.
///
/// Legal transitions are `Scheduled -> Executing -> Executed` and
/// `Scheduled -> Cancelled`. `Executed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its execution time.
    #[default]
    Scheduled,
    /// The timer fired and the job is running. Cannot be cancelled.
    Executing,
    /// Finished running.
    Executed,
    /// Cancelled before it fired.
    Cancelled,
}

impl JobStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Executed | JobStatus::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Scheduled, JobStatus::Executing)
                | (JobStatus::Scheduled, JobStatus::Cancelled)
                | (JobStatus::Executing, JobStatus::Executed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Scheduled => "scheduled",
            JobStatus::Executing => "executing",
            JobStatus::Executed => "executed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Job {
    /// Create a new job in the `Scheduled` state with a fresh id.
    pub fn new(description: String, execute_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            description,
            execute_at,
            status: JobStatus::Scheduled,
            executed_at: None,
        }
    }

    /// Move the job to `next`, rejecting illegal transitions.
    ///
    /// `now` becomes `executed_at` when `next` is `Executed`.
    pub fn transition(&mut self, next: JobStatus, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulerError::InvalidState {
                id: self.id.to_string(),
                status: self.status,
                requested: next,
            });
        }

        self.status = next;
        if next == JobStatus::Executed {
            self.executed_at = Some(now);
        }
        Ok(())
    }

    /// Mark the job cancelled. Only scheduled jobs can be cancelled.
    pub fn cancel(&mut self) -> Result<(), SchedulerError> {
        self.transition(JobStatus::Cancelled, Utc::now())
    }

    /// Enter `Executing` if the job is still scheduled.
    ///
    /// Returns false, leaving the job untouched, if something else got to it
    /// first.
    pub fn begin_execution(&mut self) -> bool {
        self.transition(JobStatus::Executing, Utc::now()).is_ok()
    }

    /// Complete an executing job, recording when it finished.
    pub fn finish_execution(&mut self, at: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.transition(JobStatus::Executed, at)
    }
}
