//! Background notification worker
//!
//! Sweeps pending notifications on a fixed cadence and retries
//! delivery until each row is sent or exhausts its attempts. A sweep
//! failure backs the loop off before the next tick.

use crate::config;
use crate::error::Result;
use crate::services::notifications::NotificationService;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Periodic delivery sweep over pending notifications
pub struct NotificationWorker {
    notifications: NotificationService,
    sweep_interval: Duration,
    error_backoff: Duration,
}

/// Handle to a running worker. Dropping it leaves the worker running;
/// call [`WorkerHandle::stop`] for an orderly shutdown.
pub struct WorkerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker and wait for its loop to exit
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

impl NotificationWorker {
    pub fn new(notifications: NotificationService) -> Self {
        Self::with_intervals(
            notifications,
            config::WORKER_SWEEP_INTERVAL,
            config::WORKER_ERROR_BACKOFF,
        )
    }

    /// Worker with custom timings, used by tests
    pub fn with_intervals(
        notifications: NotificationService,
        sweep_interval: Duration,
        error_backoff: Duration,
    ) -> Self {
        Self {
            notifications,
            sweep_interval,
            error_backoff,
        }
    }

    /// Spawn the sweep loop. The first sweep runs immediately.
    pub fn start(self) -> WorkerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            tracing::info!(
                "Notification worker started, sweeping every {:?}",
                self.sweep_interval
            );

            let mut interval = tokio::time::interval(self.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut stop_armed = true;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep().await {
                            tracing::error!("Notification sweep failed: {}", e);
                            tokio::time::sleep(self.error_backoff).await;
                        }
                    }
                    changed = stop_rx.changed(), if stop_armed => {
                        match changed {
                            Ok(()) => {
                                if *stop_rx.borrow() {
                                    tracing::info!("Notification worker stopping");
                                    break;
                                }
                            }
                            Err(_) => {
                                // Handle dropped, a stop signal can no longer arrive
                                tracing::debug!("Worker handle dropped, sweeping unattended");
                                stop_armed = false;
                            }
                        }
                    }
                }
            }
        });

        WorkerHandle {
            stop: stop_tx,
            task,
        }
    }

    async fn sweep(&self) -> Result<()> {
        let delivered = self.notifications.process_pending().await?;
        if delivered > 0 {
            tracing::info!("Notification sweep delivered {} notifications", delivered);
        }
        Ok(())
    }
}
