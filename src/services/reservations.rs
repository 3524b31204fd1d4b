//! Reservation lifecycle
//!
//! Owns admission control and the reservation state machine. The only
//! legal transitions are Confirmed -> Cancelled and Confirmed ->
//! Completed; re-applying the current state is a silent no-op.
//!
//! Notification and reminder side effects are best-effort: their
//! failures are logged and the booking operation still succeeds.

use crate::config;
use crate::database::{
    Court, CourtStatus, CreateReservationRequest, Repository, Reservation, ReservationStatus,
};
use crate::error::{BookingError, Result};
use crate::services::availability::AvailabilityService;
use crate::services::notifications::NotificationService;
use crate::services::reminders::ReminderScheduler;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Price of a booking: hourly rate times fractional hours, rounded
/// half-up to cents.
pub fn quote_price(reservation: &Reservation, court: &Court) -> f64 {
    let raw = court.hourly_price * reservation.duration_hours();
    (raw * 100.0).round() / 100.0
}

/// Log-and-continue path for side effects that must not fail the
/// parent operation
fn best_effort<T>(context: &str, reservation_id: i64, result: Result<T>) {
    if let Err(e) = result {
        tracing::error!(
            "{} for reservation {} failed, operation continues: {}",
            context,
            reservation_id,
            e
        );
    }
}

/// Service for creating and transitioning reservations
#[derive(Clone)]
pub struct ReservationService {
    repo: Repository,
    availability: AvailabilityService,
    notifications: NotificationService,
    reminders: ReminderScheduler,
    // Serializes the admission sequence; see create_reservation
    booking_lock: Arc<Mutex<()>>,
}

impl ReservationService {
    pub fn new(
        repo: Repository,
        availability: AvailabilityService,
        notifications: NotificationService,
        reminders: ReminderScheduler,
    ) -> Self {
        Self {
            repo,
            availability,
            notifications,
            reminders,
            booking_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a reservation.
    ///
    /// Check order: time validation, court exists, maintenance,
    /// fully-booked admission window, slot conflict. The checks and the
    /// insert run under one lock so two concurrent requests for the
    /// same slot cannot both pass; the conflict check additionally
    /// shares a transaction with the insert.
    ///
    /// On success the confirmation fan-out and reminder registration
    /// run best-effort.
    pub async fn create_reservation(&self, req: CreateReservationRequest) -> Result<Reservation> {
        if req.end_time <= req.start_time {
            return Err(BookingError::Validation(
                "end time must be after start time".to_string(),
            ));
        }

        let reservation = {
            let _guard = self.booking_lock.lock().await;

            let court = self.repo.get_court(req.court_id).await?;
            if court.status == CourtStatus::Maintenance {
                return Err(BookingError::Maintenance(court.id));
            }

            let report = self.availability.rolling_window(court.id).await?;
            if report.is_fully_booked() {
                tracing::warn!(
                    "Court {} rejected a booking at {:.1}% free over the admission window",
                    court.id,
                    report.percent_free
                );
                return Err(BookingError::FullyBooked(
                    court.id,
                    config::ADMISSION_WINDOW_DAYS,
                ));
            }

            self.repo.create_reservation(&req).await?
        };

        tracing::info!(
            "Reservation {} created: user {} court {} on {} {}-{}",
            reservation.id,
            reservation.user_id,
            reservation.court_id,
            reservation.date,
            reservation.start_time,
            reservation.end_time
        );

        best_effort(
            "Confirmation notification",
            reservation.id,
            self.notifications
                .notify_reservation_confirmed(&reservation)
                .await,
        );
        best_effort(
            "Reminder scheduling",
            reservation.id,
            self.reminders.schedule_reminders(&reservation).await,
        );

        Ok(reservation)
    }

    /// Cancel a reservation on behalf of a user.
    ///
    /// Non-admins may only cancel their own reservations and only while
    /// the booked date is still in the future. Cancelling an already
    /// cancelled reservation is a no-op with no second notification.
    pub async fn cancel_reservation(
        &self,
        reservation_id: i64,
        by_user_id: i64,
    ) -> Result<Reservation> {
        let reservation = self.repo.get_reservation(reservation_id).await?;
        let actor = self.repo.get_user(by_user_id).await?;

        if !actor.is_admin() {
            if reservation.user_id != actor.id {
                return Err(BookingError::Forbidden(actor.id, reservation.id));
            }
            if reservation.date <= Utc::now().date_naive() {
                return Err(BookingError::TooLate(reservation.id));
            }
        }

        let updated = match self
            .transition(&reservation, ReservationStatus::Cancelled)
            .await?
        {
            Some(updated) => updated,
            None => return Ok(reservation),
        };

        best_effort(
            "Cancellation notification",
            updated.id,
            self.notifications
                .notify_reservation_cancelled(&updated)
                .await,
        );
        best_effort(
            "Reminder cancellation",
            updated.id,
            self.reminders.cancel_reminders(updated.id).await,
        );

        Ok(updated)
    }

    /// Administrative confirm.
    ///
    /// Reservations are born Confirmed, so this only acknowledges an
    /// already confirmed row; terminal states never reopen.
    pub async fn confirm_reservation(&self, reservation_id: i64) -> Result<Reservation> {
        let reservation = self.repo.get_reservation(reservation_id).await?;
        self.transition(&reservation, ReservationStatus::Confirmed)
            .await?;
        Ok(reservation)
    }

    /// Mark a reservation as completed. Completions are not notified.
    pub async fn complete_reservation(&self, reservation_id: i64) -> Result<Reservation> {
        let reservation = self.repo.get_reservation(reservation_id).await?;

        match self
            .transition(&reservation, ReservationStatus::Completed)
            .await?
        {
            Some(updated) => Ok(updated),
            None => Ok(reservation),
        }
    }

    /// Apply the state machine.
    ///
    /// Returns `Ok(None)` when the reservation is already in the target
    /// state. Illegal transitions are rejected before touching the row.
    async fn transition(
        &self,
        reservation: &Reservation,
        to: ReservationStatus,
    ) -> Result<Option<Reservation>> {
        if reservation.status == to {
            tracing::debug!(
                "Reservation {} already {}, nothing to do",
                reservation.id,
                to.as_str()
            );
            return Ok(None);
        }

        let legal = matches!(
            (reservation.status, to),
            (ReservationStatus::Confirmed, ReservationStatus::Cancelled)
                | (ReservationStatus::Confirmed, ReservationStatus::Completed)
        );
        if !legal {
            return Err(BookingError::InvalidTransition {
                from: reservation.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let updated = self.repo.set_reservation_status(reservation.id, to).await?;
        tracing::info!(
            "Reservation {} transitioned {} -> {}",
            reservation.id,
            reservation.status.as_str(),
            to.as_str()
        );
        Ok(Some(updated))
    }

    /// Price quote for an existing reservation
    pub async fn quote(&self, reservation_id: i64) -> Result<f64> {
        let reservation = self.repo.get_reservation(reservation_id).await?;
        let court = self.repo.get_court(reservation.court_id).await?;
        Ok(quote_price(&reservation, &court))
    }

    /// Effective status of a court.
    ///
    /// Maintenance is authoritative; otherwise a court with an upcoming
    /// confirmed reservation reads as Occupied, else Available.
    pub async fn court_status(&self, court_id: i64) -> Result<CourtStatus> {
        let court = self.repo.get_court(court_id).await?;
        if court.status == CourtStatus::Maintenance {
            return Ok(CourtStatus::Maintenance);
        }

        let upcoming = self
            .repo
            .count_upcoming_confirmed(court_id, Utc::now().date_naive())
            .await?;
        Ok(if upcoming > 0 {
            CourtStatus::Occupied
        } else {
            CourtStatus::Available
        })
    }

    /// A user's reservations, newest date first
    pub async fn for_user(&self, user_id: i64) -> Result<Vec<Reservation>> {
        self.repo.list_reservations_for_user(user_id).await
    }

    pub async fn get(&self, reservation_id: i64) -> Result<Reservation> {
        self.repo.get_reservation(reservation_id).await
    }
}
