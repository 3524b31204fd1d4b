//! Application configuration constants
//!
//! Central location for the booking policy knobs, resource limits and
//! background-task timings used throughout the core.

use std::time::Duration;

// ===== Operational Window =====

/// First bookable hour of the day (inclusive).
pub const OPEN_HOUR: u32 = 6;

/// Last bookable hour of the day (exclusive).
pub const CLOSE_HOUR: u32 = 22;

/// Occupiable hours per day. Hours outside 06:00-22:00 never count.
pub const OPERATIONAL_HOURS_PER_DAY: i64 = (CLOSE_HOUR - OPEN_HOUR) as i64;

// ===== Admission Control =====

/// Length of the rolling availability window inspected before accepting a
/// new booking, counted from today.
pub const ADMISSION_WINDOW_DAYS: i64 = 30;

/// A court whose free percentage over the admission window is at or below
/// this value rejects all new bookings, even for slots that are free.
pub const FULLY_BOOKED_THRESHOLD_PCT: f64 = 5.0;

// ===== Notification Delivery =====

/// Delivery attempts before a notification is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// Pause between background worker sweeps.
pub const WORKER_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Longer pause applied after a sweep fails internally.
pub const WORKER_ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Sent and failed notifications older than this are pruned by the daily
/// maintenance job.
pub const NOTIFICATION_RETENTION_DAYS: i64 = 30;

// ===== Reminders =====

/// Hours before a reservation's start at which the early reminder fires.
pub const REMINDER_LONG_HOURS: i64 = 24;

/// Hours before a reservation's start at which the late reminder fires.
pub const REMINDER_SHORT_HOURS: i64 = 2;

/// Cron expression for daily maintenance (02:00), used for pruning old
/// notifications and sweeping stale reminder jobs.
pub const DAILY_MAINTENANCE_CRON: &str = "0 0 2 * * *";

// ===== Display formats =====

/// Date format used in notification payloads and email bodies.
pub const DATE_DISPLAY_FORMAT: &str = "%d/%m/%Y";

/// Time format used in notification payloads and email bodies.
pub const TIME_DISPLAY_FORMAT: &str = "%H:%M";

/// Timestamp format for cancellation records.
pub const TIMESTAMP_DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M";

// ===== Daemon defaults =====

/// Database file used when COURTBOOK_DB is not set.
pub const DEFAULT_DB_PATH: &str = "courtbook.db";
