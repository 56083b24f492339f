//! Lock-guarded job store.
//!
//! Every read and write goes through one `RwLock` over the whole map. Job
//! volume is moderate, so correctness wins over sharding.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio::task::AbortHandle;

use crate::{Job, JobId, JobStatus, SchedulerError};

/// A stored job plus the timer task that will fire it.
#[derive(Debug)]
struct Entry {
    job: Job,
    timer: Option<AbortHandle>,
}

impl Entry {
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Authoritative mapping from job id to job.
#[derive(Debug, Default)]
pub struct JobStore {
    entries: RwLock<HashMap<JobId, Entry>>,
}

impl JobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job. The caller guarantees the id is fresh.
    pub async fn put(&self, job: Job) {
        let mut entries = self.entries.write().await;
        entries.insert(job.id, Entry { job, timer: None });
    }

    /// Record the timer task that will fire the job.
    ///
    /// If the job is already gone the timer is aborted and `JobNotFound` is
    /// returned.
    pub async fn attach_timer(&self, id: &JobId, timer: AbortHandle) -> Result<(), SchedulerError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) => {
                entry.timer = Some(timer);
                Ok(())
            }
            None => {
                timer.abort();
                Err(SchedulerError::JobNotFound(id.to_string()))
            }
        }
    }

    /// Get a snapshot of a job.
    pub async fn get(&self, id: &JobId) -> Result<Job, SchedulerError> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| SchedulerError::JobNotFound(id.to_string()))
    }

    /// Snapshot every stored job, in no particular order.
    pub async fn list(&self) -> Vec<Job> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| entry.job.clone())
            .collect()
    }

    /// Delete a job, stopping its timer.
    pub async fn remove(&self, id: &JobId) -> Result<Job, SchedulerError> {
        let mut entries = self.entries.write().await;
        let mut entry = entries
            .remove(id)
            .ok_or_else(|| SchedulerError::JobNotFound(id.to_string()))?;
        entry.stop_timer();
        Ok(entry.job)
    }

    /// Apply `f` to a job under exclusive access.
    pub async fn mutate<T, F>(&self, id: &JobId, f: F) -> Result<T, SchedulerError>
    where
        F: FnOnce(&mut Job) -> T,
    {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| SchedulerError::JobNotFound(id.to_string()))?;
        Ok(f(&mut entry.job))
    }

    /// Apply `f` under exclusive access and remove the job only if it succeeds.
    ///
    /// Both happen under one write guard, so no other store operation can
    /// observe the job between the two.
    pub async fn remove_if<F>(&self, id: &JobId, f: F) -> Result<Job, SchedulerError>
    where
        F: FnOnce(&mut Job) -> Result<(), SchedulerError>,
    {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| SchedulerError::JobNotFound(id.to_string()))?;
        f(&mut entry.job)?;

        let mut entry = entries
            .remove(id)
            .ok_or_else(|| SchedulerError::JobNotFound(id.to_string()))?;
        entry.stop_timer();
        Ok(entry.job)
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Number of stored jobs currently in `status`.
    pub async fn count_with_status(&self, status: JobStatus) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.job.status == status)
            .count()
    }
}
