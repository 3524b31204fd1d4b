//! Database models
//!
//! Rust structs representing database entities. Enum columns are stored
//! as lowercase TEXT and mapped through `sqlx::Type`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Role attached to a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Client,
    Admin,
}

/// A registered account that owns reservations and notifications
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Operational state of a court
///
/// `Maintenance` is set manually and blocks new reservations.
/// `Available` and `Occupied` are derived from upcoming bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CourtStatus {
    Available,
    Occupied,
    Maintenance,
}

/// A bookable court
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Court {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub hourly_price: f64,
    pub status: CourtStatus,
}

/// Lifecycle state of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }
}

/// A court booking for a contiguous block of time on a single day
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub court_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Reservation {
    /// Booked duration in fractional hours
    pub fn duration_hours(&self) -> f64 {
        (self.end_time - self.start_time).num_seconds() as f64 / 3600.0
    }

    /// Start of the booking as an instant, wall clock read as UTC
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.start_time).and_utc()
    }
}

/// Create reservation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservationRequest {
    pub user_id: i64,
    pub court_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub notes: Option<String>,
}

/// Delivery channel for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    InApp,
    Sms,
    Push,
}

/// What a notification is about, persisted so delivery can pick the
/// matching template without inspecting titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Cancellation,
    #[sqlx(rename = "reminder_24h")]
    #[serde(rename = "reminder_24h")]
    Reminder24h,
    #[sqlx(rename = "reminder_2h")]
    #[serde(rename = "reminder_2h")]
    Reminder2h,
}

/// Delivery state of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

/// Structured reservation context carried by a notification
///
/// `date` and `time` are preformatted for display. Optional fields are
/// populated per kind: `cancelled_at`/`cancel_policy` on cancellations,
/// `window`/`time_remaining` on reminders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReservationDetails {
    pub reservation_id: i64,
    pub date: String,
    pub time: String,
    pub court_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<String>,
}

/// A queued or delivered notification
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub channel: Channel,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub attempts: i64,
    pub max_attempts: i64,
    pub payload: Option<Json<ReservationDetails>>,
}

impl Notification {
    /// Whether the sweep should still try to deliver this notification
    pub fn is_retryable(&self) -> bool {
        self.status == NotificationStatus::Pending && self.attempts < self.max_attempts
    }
}

/// Create notification request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: i64,
    pub channel: Channel,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub payload: Option<ReservationDetails>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_hours_fractional() {
        let reservation = Reservation {
            id: 1,
            user_id: 1,
            court_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            status: ReservationStatus::Confirmed,
            created_at: Utc::now(),
            notes: None,
        };

        assert!((reservation.duration_hours() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_payload_omits_empty_optionals() {
        let details = ReservationDetails {
            reservation_id: 7,
            date: "10/03/2026".to_string(),
            time: "10:00".to_string(),
            court_name: "Center Court".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_string(&details).unwrap();
        assert!(!json.contains("cancelled_at"));
        assert!(!json.contains("window"));
    }

    #[test]
    fn test_notification_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::Reminder24h).unwrap(),
            "\"reminder_24h\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationKind::Confirmation).unwrap(),
            "\"confirmation\""
        );
    }

    #[test]
    fn test_retryable_respects_attempt_cap() {
        let mut notification = Notification {
            id: 1,
            user_id: 1,
            channel: Channel::Email,
            kind: NotificationKind::Confirmation,
            title: "t".to_string(),
            body: "b".to_string(),
            status: NotificationStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            attempts: 2,
            max_attempts: 3,
            payload: None,
        };

        assert!(notification.is_retryable());
        notification.attempts = 3;
        assert!(!notification.is_retryable());
    }
}
