//! Job runner
//!
//! Thin wrapper over tokio-cron-scheduler that tracks jobs under
//! deterministic string ids, so callers can cancel or replace a job
//! without holding on to scheduler guids.

use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Scheduler facade with a string-id job registry
///
/// One-shot entries stay registered after they fire; the daily cleanup
/// job prunes them once their reservation is in the past.
#[derive(Clone)]
pub struct JobRunner {
    scheduler: Arc<RwLock<JobScheduler>>,
    jobs: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl JobRunner {
    /// Create a new job runner
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| BookingError::Scheduling(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            jobs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| BookingError::Scheduling(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Job scheduler started");
        Ok(())
    }

    /// Schedule a one-shot task at an absolute time.
    ///
    /// An existing job under the same id is cancelled first. Times in
    /// the past are skipped; returns whether the task was scheduled.
    pub async fn schedule_at<F, Fut>(&self, id: &str, run_at: DateTime<Utc>, task: F) -> Result<bool>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = run_at - Utc::now();
        if delay <= chrono::Duration::zero() {
            tracing::debug!("Skipping job {} scheduled in the past ({})", id, run_at);
            return Ok(false);
        }

        // Replace semantics
        self.cancel(id).await?;

        let delay = delay
            .to_std()
            .map_err(|e| BookingError::Scheduling(format!("Invalid job delay: {}", e)))?;
        let instant = std::time::Instant::now() + delay;

        let job = Job::new_one_shot_at_instant_async(instant, move |_uuid, _l| Box::pin(task()))
            .map_err(|e| BookingError::Scheduling(format!("Failed to create job: {}", e)))?;

        self.register(id, job).await?;
        tracing::info!("Scheduled job {} for {}", id, run_at);
        Ok(true)
    }

    /// Schedule a recurring task from a cron expression (with seconds).
    ///
    /// An existing job under the same id is cancelled first.
    pub async fn schedule_cron<F, Fut>(&self, id: &str, cron: &str, task: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(id).await?;

        let job = Job::new_async(cron, move |_uuid, _l| Box::pin(task()))
            .map_err(|e| BookingError::Scheduling(format!("Failed to create cron job: {}", e)))?;

        self.register(id, job).await?;
        tracing::info!("Scheduled cron job {} ({})", id, cron);
        Ok(())
    }

    async fn register(&self, id: &str, job: Job) -> Result<()> {
        let job_id = job.guid();

        // Lock order: jobs before scheduler, same as cancel
        let mut jobs = self.jobs.write().await;
        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| BookingError::Scheduling(format!("Failed to add job: {}", e)))?;

        jobs.insert(id.to_string(), job_id);
        Ok(())
    }

    /// Cancel a tracked job. Returns whether one was removed.
    pub async fn cancel(&self, id: &str) -> Result<bool> {
        let mut jobs = self.jobs.write().await;

        if let Some(job_id) = jobs.remove(id) {
            let scheduler = self.scheduler.write().await;
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| BookingError::Scheduling(format!("Failed to remove job: {}", e)))?;

            tracing::info!("Cancelled job {}", id);
            return Ok(true);
        }

        Ok(false)
    }

    /// Whether a job is tracked under this id
    pub async fn is_scheduled(&self, id: &str) -> bool {
        self.jobs.read().await.contains_key(id)
    }

    /// Ids of all tracked jobs
    pub async fn pending_ids(&self) -> Vec<String> {
        self.jobs.read().await.keys().cloned().collect()
    }

    /// Shutdown scheduler gracefully
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| BookingError::Scheduling(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Job scheduler shutdown");
        Ok(())
    }
}
