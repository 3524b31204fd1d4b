//! Repository layer for database operations
//!
//! This module provides CRUD operations for all entities. Reservation
//! admission runs its overlap check and insert inside one transaction.

use super::models::*;
use crate::config;
use crate::error::{BookingError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create_user(&self, name: &str, email: &str, role: UserRole) -> Result<User> {
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, role, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(role)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created user: {}", user.id);
        Ok(user)
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: i64) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(BookingError::NotFound("user", id))?;

        Ok(user)
    }

    /// Create a new court
    pub async fn create_court(
        &self,
        name: &str,
        description: Option<&str>,
        hourly_price: f64,
    ) -> Result<Court> {
        let court = sqlx::query_as::<_, Court>(
            r#"
            INSERT INTO courts (name, description, hourly_price)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(hourly_price)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created court: {}", court.id);
        Ok(court)
    }

    /// Get a court by ID
    pub async fn get_court(&self, id: i64) -> Result<Court> {
        let court = sqlx::query_as::<_, Court>("SELECT * FROM courts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(BookingError::NotFound("court", id))?;

        Ok(court)
    }

    /// List all courts
    pub async fn list_courts(&self) -> Result<Vec<Court>> {
        let courts = sqlx::query_as::<_, Court>("SELECT * FROM courts ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(courts)
    }

    /// Set the stored status of a court
    pub async fn set_court_status(&self, id: i64, status: CourtStatus) -> Result<()> {
        let rows = sqlx::query("UPDATE courts SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(BookingError::NotFound("court", id));
        }

        tracing::debug!("Set court {} status to {:?}", id, status);
        Ok(())
    }

    /// Count confirmed reservations for a court on or after a date
    pub async fn count_upcoming_confirmed(&self, court_id: i64, from: NaiveDate) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM reservations
            WHERE court_id = ? AND date >= ? AND status = 'confirmed'
            "#,
        )
        .bind(court_id)
        .bind(from)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Create a reservation, rejecting overlaps with confirmed bookings
    ///
    /// Check and insert share one transaction so a concurrent writer
    /// cannot slip a conflicting row between them.
    pub async fn create_reservation(&self, req: &CreateReservationRequest) -> Result<Reservation> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let conflict: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM reservations
            WHERE court_id = ? AND date = ? AND status = 'confirmed'
              AND start_time < ? AND end_time > ?
            LIMIT 1
            "#,
        )
        .bind(req.court_id)
        .bind(req.date)
        .bind(req.end_time)
        .bind(req.start_time)
        .fetch_optional(&mut *tx)
        .await?;

        if conflict.is_some() {
            return Err(BookingError::Conflict(req.court_id));
        }

        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (user_id, court_id, date, start_time, end_time, created_at, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(req.user_id)
        .bind(req.court_id)
        .bind(req.date)
        .bind(req.start_time)
        .bind(req.end_time)
        .bind(now)
        .bind(&req.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            "Created reservation {} for court {} on {}",
            reservation.id,
            reservation.court_id,
            reservation.date
        );
        Ok(reservation)
    }

    /// Get a reservation by ID
    pub async fn get_reservation(&self, id: i64) -> Result<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(BookingError::NotFound("reservation", id))?;

        Ok(reservation)
    }

    /// Whether any confirmed reservation overlaps the given block
    pub async fn has_conflict(
        &self,
        court_id: i64,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<bool> {
        let existing: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM reservations
            WHERE court_id = ? AND date = ? AND status = 'confirmed'
              AND start_time < ? AND end_time > ?
            LIMIT 1
            "#,
        )
        .bind(court_id)
        .bind(date)
        .bind(end_time)
        .bind(start_time)
        .fetch_optional(&self.pool)
        .await?;

        Ok(existing.is_some())
    }

    /// List a user's reservations, newest date first
    pub async fn list_reservations_for_user(&self, user_id: i64) -> Result<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE user_id = ?
            ORDER BY date DESC, start_time DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    /// Confirmed reservations for a court within an inclusive date range
    pub async fn list_confirmed_in_range(
        &self,
        court_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE court_id = ? AND status = 'confirmed' AND date >= ? AND date <= ?
            ORDER BY date ASC, start_time ASC
            "#,
        )
        .bind(court_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    /// Confirmed reservations for a court on a single day
    pub async fn list_confirmed_on(&self, court_id: i64, date: NaiveDate) -> Result<Vec<Reservation>> {
        self.list_confirmed_in_range(court_id, date, date).await
    }

    /// Confirmed reservations dated strictly after the given day, all courts
    pub async fn list_future_confirmed(&self, after: NaiveDate) -> Result<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE status = 'confirmed' AND date > ?
            ORDER BY date ASC, start_time ASC
            "#,
        )
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    /// Set the status of a reservation and return the updated row
    pub async fn set_reservation_status(
        &self,
        id: i64,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        let rows = sqlx::query("UPDATE reservations SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(BookingError::NotFound("reservation", id));
        }

        tracing::debug!("Set reservation {} status to {}", id, status.as_str());
        self.get_reservation(id).await
    }

    /// Create a notification in pending state
    pub async fn create_notification(&self, req: &CreateNotificationRequest) -> Result<Notification> {
        let now = Utc::now();
        let payload = req.payload.clone().map(Json);

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, channel, kind, title, body, created_at, max_attempts, payload)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(req.user_id)
        .bind(req.channel)
        .bind(req.kind)
        .bind(&req.title)
        .bind(&req.body)
        .bind(now)
        .bind(config::DEFAULT_MAX_ATTEMPTS)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            "Created {:?} notification {} for user {}",
            notification.channel,
            notification.id,
            notification.user_id
        );
        Ok(notification)
    }

    /// Get a notification by ID
    pub async fn get_notification(&self, id: i64) -> Result<Notification> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(BookingError::NotFound("notification", id))?;

        Ok(notification)
    }

    /// List a user's notifications, newest first
    pub async fn list_notifications_for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Pending notifications that still have delivery attempts left
    pub async fn list_pending_retryable(&self) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE status = 'pending' AND attempts < max_attempts
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Mark a pending notification as sent
    ///
    /// Guarded on status so a concurrent sweep cannot double-send.
    /// Returns false when the row was not pending anymore.
    pub async fn mark_notification_sent(&self, id: i64) -> Result<bool> {
        let now = Utc::now();

        let rows = sqlx::query(
            r#"
            UPDATE notifications SET status = 'sent', sent_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows > 0 {
            tracing::debug!("Marked notification {} as sent", id);
        }
        Ok(rows > 0)
    }

    /// Record a failed delivery attempt
    ///
    /// Increments the counter and flips the row to failed once the
    /// attempt cap is reached. Rows already sent or failed are left
    /// untouched. Returns the row as stored afterwards.
    pub async fn record_failed_attempt(&self, id: i64) -> Result<Notification> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET attempts = attempts + 1,
                status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE status END
            WHERE id = ? AND status = 'pending' AND attempts < max_attempts
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_notification(id).await
    }

    /// Delete sent and failed notifications created before the cutoff
    pub async fn prune_notifications_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let rows = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE created_at < ? AND status IN ('sent', 'failed')
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::info!("Pruned {} old notifications", rows);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    async fn seed_user_and_court(repo: &Repository) -> (User, Court) {
        let user = repo
            .create_user("Ana", "ana@example.com", UserRole::Client)
            .await
            .unwrap();
        let court = repo
            .create_court("Center Court", Some("Clay"), 20.0)
            .await
            .unwrap();
        (user, court)
    }

    fn block(
        user: &User,
        court: &Court,
        date: NaiveDate,
        start: (u32, u32),
        end: (u32, u32),
    ) -> CreateReservationRequest {
        CreateReservationRequest {
            user_id: user.id,
            court_id: court.id,
            date,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_reservation() {
        let repo = create_test_repo().await;
        let (user, court) = seed_user_and_court(&repo).await;
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let reservation = repo
            .create_reservation(&block(&user, &court, date, (10, 0), (11, 0)))
            .await
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Confirmed);

        let fetched = repo.get_reservation(reservation.id).await.unwrap();
        assert_eq!(fetched.id, reservation.id);
        assert_eq!(fetched.date, date);
        assert_eq!(fetched.start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_overlapping_reservation_rejected() {
        let repo = create_test_repo().await;
        let (user, court) = seed_user_and_court(&repo).await;
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        repo.create_reservation(&block(&user, &court, date, (10, 0), (11, 30)))
            .await
            .unwrap();

        assert!(repo
            .has_conflict(
                court.id,
                date,
                NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
                NaiveTime::from_hms_opt(10, 45, 0).unwrap()
            )
            .await
            .unwrap());

        let result = repo
            .create_reservation(&block(&user, &court, date, (11, 0), (12, 0)))
            .await;
        assert!(matches!(result, Err(BookingError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_touching_blocks_allowed() {
        let repo = create_test_repo().await;
        let (user, court) = seed_user_and_court(&repo).await;
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        repo.create_reservation(&block(&user, &court, date, (10, 0), (11, 0)))
            .await
            .unwrap();

        // Back-to-back bookings share an endpoint but not an interval
        repo.create_reservation(&block(&user, &court, date, (11, 0), (12, 0)))
            .await
            .unwrap();

        let on_day = repo.list_confirmed_on(court.id, date).await.unwrap();
        assert_eq!(on_day.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_rows_do_not_conflict() {
        let repo = create_test_repo().await;
        let (user, court) = seed_user_and_court(&repo).await;
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let first = repo
            .create_reservation(&block(&user, &court, date, (10, 0), (11, 0)))
            .await
            .unwrap();
        repo.set_reservation_status(first.id, ReservationStatus::Cancelled)
            .await
            .unwrap();

        assert!(!repo
            .has_conflict(
                court.id,
                date,
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(11, 0, 0).unwrap()
            )
            .await
            .unwrap());

        repo.create_reservation(&block(&user, &court, date, (10, 0), (11, 0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_future_confirmed_skips_today_and_past() {
        let repo = create_test_repo().await;
        let (user, court) = seed_user_and_court(&repo).await;
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        repo.create_reservation(&block(&user, &court, today, (10, 0), (11, 0)))
            .await
            .unwrap();
        repo.create_reservation(&block(
            &user,
            &court,
            today.succ_opt().unwrap(),
            (10, 0),
            (11, 0),
        ))
        .await
        .unwrap();

        let future = repo.list_future_confirmed(today).await.unwrap();
        assert_eq!(future.len(), 1);
        assert_eq!(future[0].date, today.succ_opt().unwrap());
    }

    #[tokio::test]
    async fn test_notification_roundtrip_with_payload() {
        let repo = create_test_repo().await;
        let (user, _) = seed_user_and_court(&repo).await;

        let details = ReservationDetails {
            reservation_id: 1,
            date: "10/03/2026".to_string(),
            time: "10:00".to_string(),
            court_name: "Center Court".to_string(),
            ..Default::default()
        };
        let req = CreateNotificationRequest {
            user_id: user.id,
            channel: Channel::Email,
            kind: NotificationKind::Confirmation,
            title: "Reservation Confirmed".to_string(),
            body: "Your reservation has been confirmed.".to_string(),
            payload: Some(details.clone()),
        };

        let notification = repo.create_notification(&req).await.unwrap();
        assert_eq!(notification.status, NotificationStatus::Pending);
        assert_eq!(notification.attempts, 0);
        assert_eq!(notification.max_attempts, 3);

        let fetched = repo.get_notification(notification.id).await.unwrap();
        assert_eq!(fetched.kind, NotificationKind::Confirmation);
        assert_eq!(fetched.payload.as_ref().unwrap().0, details);
    }

    #[tokio::test]
    async fn test_mark_sent_only_once() {
        let repo = create_test_repo().await;
        let (user, _) = seed_user_and_court(&repo).await;

        let req = CreateNotificationRequest {
            user_id: user.id,
            channel: Channel::InApp,
            kind: NotificationKind::Confirmation,
            title: "t".to_string(),
            body: "b".to_string(),
            payload: None,
        };
        let notification = repo.create_notification(&req).await.unwrap();

        assert!(repo.mark_notification_sent(notification.id).await.unwrap());
        assert!(!repo.mark_notification_sent(notification.id).await.unwrap());

        let fetched = repo.get_notification(notification.id).await.unwrap();
        assert_eq!(fetched.status, NotificationStatus::Sent);
        assert!(fetched.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_attempts_cap_out() {
        let repo = create_test_repo().await;
        let (user, _) = seed_user_and_court(&repo).await;

        let req = CreateNotificationRequest {
            user_id: user.id,
            channel: Channel::Email,
            kind: NotificationKind::Confirmation,
            title: "t".to_string(),
            body: "b".to_string(),
            payload: None,
        };
        let notification = repo.create_notification(&req).await.unwrap();

        let after_one = repo.record_failed_attempt(notification.id).await.unwrap();
        assert_eq!(after_one.attempts, 1);
        assert_eq!(after_one.status, NotificationStatus::Pending);

        repo.record_failed_attempt(notification.id).await.unwrap();
        let after_three = repo.record_failed_attempt(notification.id).await.unwrap();
        assert_eq!(after_three.attempts, 3);
        assert_eq!(after_three.status, NotificationStatus::Failed);

        // Further attempts are no-ops once failed
        let after_four = repo.record_failed_attempt(notification.id).await.unwrap();
        assert_eq!(after_four.attempts, 3);

        let retryable = repo.list_pending_retryable().await.unwrap();
        assert!(retryable.is_empty());
    }

    #[tokio::test]
    async fn test_prune_keeps_pending() {
        let repo = create_test_repo().await;
        let (user, _) = seed_user_and_court(&repo).await;

        let req = CreateNotificationRequest {
            user_id: user.id,
            channel: Channel::Email,
            kind: NotificationKind::Confirmation,
            title: "t".to_string(),
            body: "b".to_string(),
            payload: None,
        };
        let sent = repo.create_notification(&req).await.unwrap();
        repo.mark_notification_sent(sent.id).await.unwrap();
        let pending = repo.create_notification(&req).await.unwrap();

        // Cutoff in the future catches everything old enough
        let cutoff = Utc::now() + chrono::Duration::hours(1);
        let pruned = repo.prune_notifications_before(cutoff).await.unwrap();
        assert_eq!(pruned, 1);

        assert!(repo.get_notification(sent.id).await.is_err());
        assert!(repo.get_notification(pending.id).await.is_ok());
    }
}
