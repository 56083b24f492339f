//! Job scheduler implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{Job, JobId, JobStatus, JobStore, SchedulerError};

/// How long a job stays in `Executing` while its work is simulated.
pub const DEFAULT_WORK_DURATION: Duration = Duration::from_secs(2);

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time spent between entering `Executing` and reaching `Executed`.
    pub work_duration: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            work_duration: DEFAULT_WORK_DURATION,
        }
    }
}

/// The job scheduler.
///
/// Owns the job store. Each created job gets its own timer task that holds a
/// clone of the store and the shutdown receiver; tasks never share anything
/// else. Dropping the scheduler closes the shutdown channel, which stops any
/// timer that has not fired yet.
#[derive(Debug)]
pub struct Scheduler {
    store: Arc<JobStore>,
    config: SchedulerConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a scheduler with the default work duration.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with explicit tuning.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store: Arc::new(JobStore::new()),
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Schedule a new one-shot job and start its timer.
    #[tracing::instrument(skip_all, fields(execute_at = %execute_at))]
    pub async fn create_job(
        &self,
        description: String,
        execute_at: DateTime<Utc>,
    ) -> Result<Job, SchedulerError> {
        if self.is_shutting_down() {
            return Err(SchedulerError::ShuttingDown);
        }

        if execute_at <= Utc::now() {
            return Err(SchedulerError::Validation(format!(
                "execution time must be in the future, got {}",
                execute_at.to_rfc3339()
            )));
        }

        let job = Job::new(description, execute_at);
        let id = job.id;

        // Stored before the timer exists, so the timer always finds its job
        self.store.put(job.clone()).await;

        let timer = tokio::spawn(run_timer(
            Arc::clone(&self.store),
            id,
            execute_at,
            self.config.work_duration,
            self.shutdown_rx.clone(),
        ));

        if self.store.attach_timer(&id, timer.abort_handle()).await.is_err() {
            debug!(job_id = %id, "job removed before its timer was attached");
        }

        info!(job_id = %id, execute_at = %execute_at, "scheduled job");
        Ok(job)
    }

    /// List all jobs currently held, ordered by execution time.
    pub async fn get_jobs(&self) -> Vec<Job> {
        let mut jobs = self.store.list().await;
        jobs.sort_by(|a, b| a.execute_at.cmp(&b.execute_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// Get a job by id.
    pub async fn get_job(&self, id: &JobId) -> Result<Job, SchedulerError> {
        self.store.get(id).await
    }

    /// Cancel a scheduled job and remove it.
    ///
    /// Fails with `InvalidState` once the job has started executing.
    #[tracing::instrument(skip_all, fields(job_id = %id))]
    pub async fn cancel_job(&self, id: &JobId) -> Result<Job, SchedulerError> {
        let job = self.store.remove_if(id, Job::cancel).await?;
        info!(job_id = %id, "cancelled job");
        Ok(job)
    }

    /// Number of jobs currently held.
    pub async fn job_count(&self) -> usize {
        self.store.len().await
    }

    /// Stop all timers that have not fired yet and refuse new jobs.
    ///
    /// Jobs already executing still finish. Returns how many jobs were left
    /// scheduled.
    pub async fn shutdown(&self) -> usize {
        // send_replace never fails, even with every timer gone
        self.shutdown_tx.send_replace(true);
        let pending = self.store.count_with_status(JobStatus::Scheduled).await;
        info!(pending, "scheduler shut down");
        pending
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}

/// Timer task for one job: wait for `execute_at`, then run the execution
/// transition unless the job was cancelled first.
async fn run_timer(
    store: Arc<JobStore>,
    id: JobId,
    execute_at: DateTime<Utc>,
    work_duration: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = wait_until(execute_at) => {}
        _ = shutdown_rx.wait_for(|stopped| *stopped) => {
            debug!(job_id = %id, "timer stopped by shutdown");
            return;
        }
    }

    match store.mutate(&id, Job::begin_execution).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(job_id = %id, "job no longer scheduled, skipping");
            return;
        }
        Err(_) => {
            debug!(job_id = %id, "job removed before firing, skipping");
            return;
        }
    }

    info!(job_id = %id, "executing job");

    // Executing is a commit point: nothing but this task moves the job on, so
    // the lock is not held across the work.
    sleep(work_duration).await;

    let executed_at = Utc::now();
    match store
        .mutate(&id, |job| job.finish_execution(executed_at))
        .await
    {
        Ok(Ok(())) => info!(job_id = %id, executed_at = %executed_at, "job executed"),
        Ok(Err(e)) => warn!(job_id = %id, error = %e, "could not complete job"),
        Err(_) => debug!(job_id = %id, "job removed while executing"),
    }
}

/// Sleep until the wall clock reaches `at`.
///
/// Loops because the monotonic timer and the wall clock can disagree slightly;
/// the job must never fire before its execution time.
async fn wait_until(at: DateTime<Utc>) {
    loop {
        let remaining = at - Utc::now();
        match remaining.to_std() {
            Ok(duration) if !duration.is_zero() => sleep(duration).await,
            _ => return,
        }
    }
}
