//! Reminder scheduling
//!
//! Registers one-shot jobs that fire 24 hours and 2 hours before a
//! reservation starts. Jobs re-check the reservation when they fire,
//! so a cancellation between scheduling and firing sends nothing.
//!
//! The job store is in-memory; `schedule_existing` rebuilds it from
//! the database at startup.

use crate::config;
use crate::database::{NotificationKind, Repository, Reservation, ReservationStatus};
use crate::error::Result;
use crate::services::notifications::NotificationService;
use crate::services::scheduler::JobRunner;
use chrono::{Duration, Utc};

/// The two reminder offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderWindow {
    /// Fires 24 hours before start
    Long,
    /// Fires 2 hours before start
    Short,
}

impl ReminderWindow {
    pub const ALL: [ReminderWindow; 2] = [ReminderWindow::Long, ReminderWindow::Short];

    pub fn hours(self) -> i64 {
        match self {
            ReminderWindow::Long => config::REMINDER_LONG_HOURS,
            ReminderWindow::Short => config::REMINDER_SHORT_HOURS,
        }
    }

    pub fn kind(self) -> NotificationKind {
        match self {
            ReminderWindow::Long => NotificationKind::Reminder24h,
            ReminderWindow::Short => NotificationKind::Reminder2h,
        }
    }

    /// Deterministic job id for a reservation in this window
    pub fn job_id(self, reservation_id: i64) -> String {
        match self {
            ReminderWindow::Long => format!("reminder_24h_{}", reservation_id),
            ReminderWindow::Short => format!("reminder_2h_{}", reservation_id),
        }
    }
}

fn is_reminder_job(id: &str) -> bool {
    id.starts_with("reminder_24h_") || id.starts_with("reminder_2h_")
}

/// Service that owns reminder jobs for reservations
#[derive(Clone)]
pub struct ReminderScheduler {
    repo: Repository,
    notifications: NotificationService,
    runner: JobRunner,
}

impl ReminderScheduler {
    pub fn new(repo: Repository, notifications: NotificationService, runner: JobRunner) -> Self {
        Self {
            repo,
            notifications,
            runner,
        }
    }

    /// Register both reminder jobs for a reservation.
    ///
    /// Windows whose fire time is already past are skipped. An existing
    /// job under the same id is replaced. Returns how many jobs were
    /// scheduled.
    pub async fn schedule_reminders(&self, reservation: &Reservation) -> Result<usize> {
        let mut scheduled = 0;

        for window in ReminderWindow::ALL {
            let fire_at = reservation.starts_at() - Duration::hours(window.hours());
            let job_id = window.job_id(reservation.id);

            let repo = self.repo.clone();
            let notifications = self.notifications.clone();
            let reservation_id = reservation.id;
            let kind = window.kind();

            let added = self
                .runner
                .schedule_at(&job_id, fire_at, move || {
                    let repo = repo.clone();
                    let notifications = notifications.clone();
                    async move {
                        Self::fire_reminder(repo, notifications, reservation_id, kind).await;
                    }
                })
                .await?;

            if added {
                scheduled += 1;
            }
        }

        tracing::info!(
            "Scheduled {} reminder(s) for reservation {}",
            scheduled,
            reservation.id
        );
        Ok(scheduled)
    }

    /// Remove both reminder jobs for a reservation, if present
    pub async fn cancel_reminders(&self, reservation_id: i64) -> Result<()> {
        for window in ReminderWindow::ALL {
            let job_id = window.job_id(reservation_id);
            if self.runner.cancel(&job_id).await? {
                tracing::info!("Cancelled reminder job {}", job_id);
            }
        }
        Ok(())
    }

    /// Deliver one reminder, re-checking the reservation first.
    ///
    /// Runs inside a scheduler job: failures are logged, never raised.
    async fn fire_reminder(
        repo: Repository,
        notifications: NotificationService,
        reservation_id: i64,
        kind: NotificationKind,
    ) {
        let reservation = match repo.get_reservation(reservation_id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::info!(
                    "Reminder for reservation {} skipped: {}",
                    reservation_id,
                    e
                );
                return;
            }
        };

        if reservation.status != ReservationStatus::Confirmed {
            tracing::info!(
                "Reminder for reservation {} skipped: status is {}",
                reservation_id,
                reservation.status.as_str()
            );
            return;
        }

        if reservation.starts_at() <= Utc::now() {
            tracing::info!(
                "Reminder for reservation {} skipped: already started",
                reservation_id
            );
            return;
        }

        match notifications
            .notify_reservation_reminder(&reservation, kind)
            .await
        {
            Ok(()) => tracing::info!(
                "{:?} reminder sent for reservation {}",
                kind,
                reservation_id
            ),
            Err(e) => tracing::error!(
                "Failed to send reminder for reservation {}: {}",
                reservation_id,
                e
            ),
        }
    }

    /// Register reminders for every future confirmed reservation.
    ///
    /// Called at startup to rebuild the in-memory job store. Returns
    /// how many reservations were walked.
    pub async fn schedule_existing(&self) -> Result<usize> {
        let today = Utc::now().date_naive();
        let upcoming = self.repo.list_future_confirmed(today).await?;

        tracing::info!(
            "Scheduling reminders for {} existing reservations",
            upcoming.len()
        );

        for reservation in &upcoming {
            self.schedule_reminders(reservation).await?;
        }

        Ok(upcoming.len())
    }

    /// Drop reminder jobs whose reservation no longer needs them.
    ///
    /// A job is stale when its reservation is missing, not confirmed,
    /// already started, or its id cannot be parsed. Returns how many
    /// jobs were removed.
    pub async fn cleanup_stale(&self) -> Result<usize> {
        let mut removed = 0;

        for job_id in self.runner.pending_ids().await {
            if !is_reminder_job(&job_id) {
                continue;
            }

            let stale = match job_id.rsplit('_').next().and_then(|s| s.parse::<i64>().ok()) {
                Some(reservation_id) => match self.repo.get_reservation(reservation_id).await {
                    Ok(reservation) => {
                        reservation.status != ReservationStatus::Confirmed
                            || reservation.starts_at() <= Utc::now()
                    }
                    Err(_) => true,
                },
                None => true,
            };

            if stale && self.runner.cancel(&job_id).await? {
                tracing::info!("Removed stale reminder job {}", job_id);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Reminder cleanup removed {} stale job(s)", removed);
        }
        Ok(removed)
    }

    /// Register the daily stale-job cleanup on the runner
    pub async fn schedule_daily_cleanup(&self) -> Result<()> {
        let scheduler = self.clone();
        self.runner
            .schedule_cron("daily_reminder_cleanup", config::DAILY_MAINTENANCE_CRON, move || {
                let scheduler = scheduler.clone();
                async move {
                    if let Err(e) = scheduler.cleanup_stale().await {
                        tracing::error!("Reminder cleanup failed: {}", e);
                    }
                }
            })
            .await
    }

    /// Ids of currently tracked reminder jobs
    pub async fn pending_reminders(&self) -> Vec<String> {
        self.runner
            .pending_ids()
            .await
            .into_iter()
            .filter(|id| is_reminder_job(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, CreateReservationRequest, UserRole};
    use crate::mail::MemoryMailer;
    use chrono::NaiveTime;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn create_test_scheduler() -> (ReminderScheduler, Repository, MemoryMailer) {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);
        let mailer = MemoryMailer::new();
        let notifications = NotificationService::new(repo.clone(), Arc::new(mailer.clone()));
        let runner = JobRunner::new().await.unwrap();
        let scheduler = ReminderScheduler::new(repo.clone(), notifications, runner);
        (scheduler, repo, mailer)
    }

    async fn seed_reservation_in(repo: &Repository, hours_ahead: i64) -> Reservation {
        let user = repo
            .create_user("Ana", "ana@example.com", UserRole::Client)
            .await
            .unwrap();
        let court = repo.create_court("Center Court", None, 20.0).await.unwrap();

        let starts = Utc::now() + Duration::hours(hours_ahead);
        repo.create_reservation(&CreateReservationRequest {
            user_id: user.id,
            court_id: court.id,
            date: starts.date_naive(),
            start_time: starts.time(),
            end_time: starts.time() + Duration::hours(1),
            notes: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_far_reservation_gets_both_windows() {
        let (scheduler, repo, _) = create_test_scheduler().await;
        let reservation = seed_reservation_in(&repo, 72).await;

        let scheduled = scheduler.schedule_reminders(&reservation).await.unwrap();
        assert_eq!(scheduled, 2);

        let mut pending = scheduler.pending_reminders().await;
        pending.sort();
        assert_eq!(
            pending,
            vec![
                format!("reminder_24h_{}", reservation.id),
                format!("reminder_2h_{}", reservation.id),
            ]
        );
    }

    #[tokio::test]
    async fn test_near_reservation_gets_short_window_only() {
        let (scheduler, repo, _) = create_test_scheduler().await;
        let reservation = seed_reservation_in(&repo, 3).await;

        let scheduled = scheduler.schedule_reminders(&reservation).await.unwrap();
        assert_eq!(scheduled, 1);

        let pending = scheduler.pending_reminders().await;
        assert_eq!(pending, vec![format!("reminder_2h_{}", reservation.id)]);
    }

    #[tokio::test]
    async fn test_imminent_reservation_gets_no_reminders() {
        let (scheduler, repo, _) = create_test_scheduler().await;
        let reservation = seed_reservation_in(&repo, 1).await;

        let scheduled = scheduler.schedule_reminders(&reservation).await.unwrap();
        assert_eq!(scheduled, 0);
        assert!(scheduler.pending_reminders().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_removes_both_jobs() {
        let (scheduler, repo, _) = create_test_scheduler().await;
        let reservation = seed_reservation_in(&repo, 72).await;
        scheduler.schedule_reminders(&reservation).await.unwrap();

        scheduler.cancel_reminders(reservation.id).await.unwrap();

        assert!(scheduler.pending_reminders().await.is_empty());

        // Cancelling again is a no-op
        scheduler.cancel_reminders(reservation.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_fire_skips_cancelled_reservation() {
        let (scheduler, repo, mailer) = create_test_scheduler().await;
        let reservation = seed_reservation_in(&repo, 72).await;
        repo.set_reservation_status(reservation.id, ReservationStatus::Cancelled)
            .await
            .unwrap();

        ReminderScheduler::fire_reminder(
            scheduler.repo.clone(),
            scheduler.notifications.clone(),
            reservation.id,
            NotificationKind::Reminder24h,
        )
        .await;

        assert_eq!(mailer.attempt_count(), 0);
        let rows = repo
            .list_notifications_for_user(reservation.user_id)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_fire_delivers_for_confirmed_reservation() {
        let (scheduler, repo, mailer) = create_test_scheduler().await;
        let reservation = seed_reservation_in(&repo, 72).await;

        ReminderScheduler::fire_reminder(
            scheduler.repo.clone(),
            scheduler.notifications.clone(),
            reservation.id,
            NotificationKind::Reminder2h,
        )
        .await;

        assert_eq!(mailer.sent_count().await, 1);
        let rows = repo
            .list_notifications_for_user(reservation.user_id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|n| n.kind == NotificationKind::Reminder2h));
    }

    #[tokio::test]
    async fn test_schedule_existing_walks_future_confirmed() {
        let (scheduler, repo, _) = create_test_scheduler().await;
        let far = seed_reservation_in(&repo, 96).await;

        // A second future reservation on the same court, later block
        let starts = Utc::now() + Duration::hours(72);
        repo.create_reservation(&CreateReservationRequest {
            user_id: far.user_id,
            court_id: far.court_id,
            date: starts.date_naive(),
            start_time: starts.time(),
            end_time: starts.time() + Duration::hours(1),
            notes: None,
        })
        .await
        .unwrap();

        // Cancelled rows are not rescheduled
        let cancelled = {
            let starts = Utc::now() + Duration::hours(48);
            let r = repo
                .create_reservation(&CreateReservationRequest {
                    user_id: far.user_id,
                    court_id: far.court_id,
                    date: starts.date_naive(),
                    start_time: starts.time(),
                    end_time: starts.time() + Duration::hours(1),
                    notes: None,
                })
                .await
                .unwrap();
            repo.set_reservation_status(r.id, ReservationStatus::Cancelled)
                .await
                .unwrap()
        };

        let walked = scheduler.schedule_existing().await.unwrap();
        assert_eq!(walked, 2);

        let pending = scheduler.pending_reminders().await;
        assert_eq!(pending.len(), 4);
        assert!(!pending.contains(&format!("reminder_24h_{}", cancelled.id)));
    }

    #[tokio::test]
    async fn test_cleanup_drops_jobs_for_dead_reservations() {
        let (scheduler, repo, _) = create_test_scheduler().await;
        let kept = seed_reservation_in(&repo, 72).await;
        scheduler.schedule_reminders(&kept).await.unwrap();

        let starts = Utc::now() + Duration::hours(48);
        let dropped = repo
            .create_reservation(&CreateReservationRequest {
                user_id: kept.user_id,
                court_id: kept.court_id,
                date: starts.date_naive(),
                start_time: starts.time(),
                end_time: starts.time() + Duration::hours(1),
                notes: None,
            })
            .await
            .unwrap();
        scheduler.schedule_reminders(&dropped).await.unwrap();

        repo.set_reservation_status(dropped.id, ReservationStatus::Cancelled)
            .await
            .unwrap();

        let removed = scheduler.cleanup_stale().await.unwrap();
        assert_eq!(removed, 2);

        let mut pending = scheduler.pending_reminders().await;
        pending.sort();
        assert_eq!(
            pending,
            vec![
                format!("reminder_24h_{}", kept.id),
                format!("reminder_2h_{}", kept.id),
            ]
        );
    }
}
