//! Notification dispatcher
//!
//! Every notification is persisted first and delivered from its stored
//! row, so a crash between creation and delivery loses nothing: the
//! background worker re-dispatches whatever is still pending.
//!
//! Channel policy: email gets one immediate delivery attempt at
//! creation, in-app rows are sent the moment they exist, sms and push
//! are stubs picked up by the worker sweep.

use crate::config;
use crate::database::{
    Channel, CreateNotificationRequest, Notification, NotificationKind, NotificationStatus,
    Repository, Reservation, ReservationDetails,
};
use crate::error::{BookingError, Result};
use crate::mail::{render_email, EmailContext, Mailer};
use chrono::Utc;
use std::sync::Arc;

/// Service for creating and delivering notifications
#[derive(Clone)]
pub struct NotificationService {
    repo: Repository,
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(repo: Repository, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, mailer }
    }

    /// Create a notification and run the channel's creation-time policy.
    ///
    /// A failed immediate email attempt does not fail the call; the row
    /// stays pending for the worker. Returns the row as stored.
    pub async fn notify(&self, req: CreateNotificationRequest) -> Result<Notification> {
        let notification = self.repo.create_notification(&req).await?;

        match notification.channel {
            Channel::Email | Channel::InApp => {
                if self.attempt(&notification).await.is_err() {
                    tracing::debug!(
                        "Notification {} left pending for the worker",
                        notification.id
                    );
                }
            }
            Channel::Sms | Channel::Push => {}
        }

        tracing::info!(
            "Notification created: {:?} for user {}",
            notification.channel,
            notification.user_id
        );
        self.repo.get_notification(notification.id).await
    }

    /// One delivery attempt with bookkeeping.
    ///
    /// Success marks the row sent; failure records the attempt, which
    /// flips the row to failed once the cap is reached.
    async fn attempt(&self, notification: &Notification) -> Result<()> {
        match self.dispatch(notification).await {
            Ok(()) => {
                self.repo.mark_notification_sent(notification.id).await?;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Delivery of notification {} failed: {}", notification.id, e);
                let updated = self.repo.record_failed_attempt(notification.id).await?;
                if updated.status == NotificationStatus::Failed {
                    tracing::error!(
                        "Notification {} exhausted its {} delivery attempts",
                        notification.id,
                        updated.max_attempts
                    );
                }
                Err(e)
            }
        }
    }

    /// Channel-specific delivery, no bookkeeping
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        match notification.channel {
            Channel::Email => self.send_email(notification).await,
            // The stored row is the in-app delivery
            Channel::InApp => Ok(()),
            // SMS and push gateways are not wired up yet
            Channel::Sms => {
                tracing::info!("SMS delivery stub for notification {}", notification.id);
                Ok(())
            }
            Channel::Push => {
                tracing::info!("Push delivery stub for notification {}", notification.id);
                Ok(())
            }
        }
    }

    /// Render by stored kind and hand off to the mail transport
    async fn send_email(&self, notification: &Notification) -> Result<()> {
        let user = self.repo.get_user(notification.user_id).await?;
        if user.email.is_empty() {
            return Err(BookingError::Delivery(format!(
                "user {} has no email address",
                user.id
            )));
        }

        let mut ctx = EmailContext {
            user_name: user.name.clone(),
            message: notification.body.clone(),
            ..Default::default()
        };
        if let Some(payload) = &notification.payload {
            ctx.court_name = payload.court_name.clone();
            ctx.date = payload.date.clone();
            ctx.time = payload.time.clone();
            ctx.cancelled_at = payload.cancelled_at.clone().unwrap_or_default();
            ctx.cancel_policy = payload.cancel_policy.clone().unwrap_or_default();
            ctx.time_remaining = payload.time_remaining.clone().unwrap_or_default();
        }

        let html = render_email(notification.kind, &ctx)?;
        self.mailer.send(&user.email, &notification.title, &html).await?;

        tracing::info!("Email sent to {}", user.email);
        Ok(())
    }

    /// Shared payload for a reservation's notifications
    async fn reservation_details(&self, reservation: &Reservation) -> Result<ReservationDetails> {
        let court = self.repo.get_court(reservation.court_id).await?;

        Ok(ReservationDetails {
            reservation_id: reservation.id,
            date: reservation
                .date
                .format(config::DATE_DISPLAY_FORMAT)
                .to_string(),
            time: reservation
                .start_time
                .format(config::TIME_DISPLAY_FORMAT)
                .to_string(),
            court_name: court.name,
            ..Default::default()
        })
    }

    /// Confirmation fan-out: one email, one in-app
    pub async fn notify_reservation_confirmed(&self, reservation: &Reservation) -> Result<()> {
        let details = self.reservation_details(reservation).await?;

        self.notify(CreateNotificationRequest {
            user_id: reservation.user_id,
            channel: Channel::Email,
            kind: NotificationKind::Confirmation,
            title: "Reservation Confirmed - Courtbook".to_string(),
            body: format!(
                "Your reservation for {} at {} has been confirmed successfully.",
                details.date, details.time
            ),
            payload: Some(details.clone()),
        })
        .await?;

        self.notify(CreateNotificationRequest {
            user_id: reservation.user_id,
            channel: Channel::InApp,
            kind: NotificationKind::Confirmation,
            title: "Reservation Confirmed".to_string(),
            body: format!(
                "Your reservation for {} at {} has been confirmed.",
                details.date, details.time
            ),
            payload: Some(details),
        })
        .await?;

        Ok(())
    }

    /// Cancellation fan-out: one email, one in-app
    pub async fn notify_reservation_cancelled(&self, reservation: &Reservation) -> Result<()> {
        let mut details = self.reservation_details(reservation).await?;
        details.cancelled_at = Some(
            Utc::now()
                .format(config::TIMESTAMP_DISPLAY_FORMAT)
                .to_string(),
        );
        details.cancel_policy = Some("Cancellation requested by the user".to_string());

        self.notify(CreateNotificationRequest {
            user_id: reservation.user_id,
            channel: Channel::Email,
            kind: NotificationKind::Cancellation,
            title: "Reservation Cancelled - Courtbook".to_string(),
            body: format!(
                "Your reservation for {} at {} has been cancelled successfully.",
                details.date, details.time
            ),
            payload: Some(details.clone()),
        })
        .await?;

        self.notify(CreateNotificationRequest {
            user_id: reservation.user_id,
            channel: Channel::InApp,
            kind: NotificationKind::Cancellation,
            title: "Reservation Cancelled".to_string(),
            body: format!(
                "Your reservation for {} at {} has been cancelled.",
                details.date, details.time
            ),
            payload: Some(details),
        })
        .await?;

        Ok(())
    }

    /// Reminder fan-out for one window: one email, one in-app
    pub async fn notify_reservation_reminder(
        &self,
        reservation: &Reservation,
        kind: NotificationKind,
    ) -> Result<()> {
        let mut details = self.reservation_details(reservation).await?;

        let (window, time_remaining, email_title, in_app_title) = match kind {
            NotificationKind::Reminder24h => (
                "24h",
                "24 hours",
                "\u{23f0} Reservation Reminder - Tomorrow - Courtbook",
                "\u{23f0} Reservation Reminder - Tomorrow",
            ),
            NotificationKind::Reminder2h => (
                "2h",
                "2 hours",
                "\u{1f6a8} Reservation Reminder - In 2 Hours - Courtbook",
                "\u{1f6a8} Urgent Reminder - In 2 Hours",
            ),
            other => {
                return Err(BookingError::Validation(format!(
                    "{:?} is not a reminder kind",
                    other
                )))
            }
        };

        let body = match kind {
            NotificationKind::Reminder2h => format!(
                "Urgent reminder: you have a reservation in 2 hours ({} at {}).",
                details.date, details.time
            ),
            _ => format!(
                "Reminder: you have a reservation tomorrow {} at {}.",
                details.date, details.time
            ),
        };

        details.window = Some(window.to_string());
        details.time_remaining = Some(time_remaining.to_string());

        self.notify(CreateNotificationRequest {
            user_id: reservation.user_id,
            channel: Channel::Email,
            kind,
            title: email_title.to_string(),
            body: body.clone(),
            payload: Some(details.clone()),
        })
        .await?;

        // The in-app card shows the window badge without the countdown
        details.time_remaining = None;
        self.notify(CreateNotificationRequest {
            user_id: reservation.user_id,
            channel: Channel::InApp,
            kind,
            title: in_app_title.to_string(),
            body,
            payload: Some(details),
        })
        .await?;

        Ok(())
    }

    /// One worker sweep over pending notifications.
    ///
    /// Per-row failures are recorded and logged but never abort the
    /// sweep. Returns how many rows were delivered.
    pub async fn process_pending(&self) -> Result<usize> {
        let pending = self.repo.list_pending_retryable().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        tracing::debug!("Processing {} pending notifications", pending.len());

        let mut delivered = 0;
        for notification in &pending {
            if self.attempt(notification).await.is_ok() {
                delivered += 1;
            }
        }

        tracing::info!(
            "Sweep delivered {} of {} pending notifications",
            delivered,
            pending.len()
        );
        Ok(delivered)
    }

    /// Delete sent and failed notifications older than the given age
    pub async fn prune_old(&self, days: i64) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        self.repo.prune_notifications_before(cutoff).await
    }

    /// A user's notifications, newest first
    pub async fn for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.repo.list_notifications_for_user(user_id).await
    }
}
