//! Availability calculator
//!
//! Computes occupied vs. free hourly slots for a court over a date
//! range, from its confirmed reservations. The occupancy arithmetic
//! works on whole hour components clamped to the operational window.

use crate::config;
use crate::database::{Court, CourtStatus, Repository, Reservation, ReservationStatus};
use crate::error::Result;
use chrono::{Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;

/// Occupancy summary for one court over a date range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub occupied_hours: i64,
    pub total_hours: i64,
    pub percent_free: f64,
}

impl AvailabilityReport {
    /// Admission-control sense of "no room left"
    pub fn is_fully_booked(&self) -> bool {
        self.percent_free <= config::FULLY_BOOKED_THRESHOLD_PCT
    }
}

/// A court together with its availability over the rolling window
#[derive(Debug, Clone, Serialize)]
pub struct CourtAvailability {
    pub court: Court,
    pub report: AvailabilityReport,
}

/// Occupied hours of one reservation, clamped to the operational window.
///
/// Only hour components count. An end hour of 0 is read as midnight at
/// the end of the day, so a block running to 00:00 covers its evening
/// hours instead of none.
fn occupied_hours(start: NaiveTime, end: NaiveTime) -> i64 {
    let start_hour = i64::from(start.hour()).max(i64::from(config::OPEN_HOUR));
    let end_hour = if end.hour() == 0 {
        24
    } else {
        i64::from(end.hour())
    };
    let end_hour = end_hour.min(i64::from(config::CLOSE_HOUR));

    (end_hour - start_hour).max(0)
}

/// Compute availability over `[from, to]` from the given reservations.
///
/// Rows outside the range or not confirmed are ignored, so callers may
/// pass broader sets. A zero-day range reports 100% free.
pub fn compute_availability(
    reservations: &[Reservation],
    from: NaiveDate,
    to: NaiveDate,
) -> AvailabilityReport {
    let days = (to - from).num_days();
    let total_hours = days.max(0) * config::OPERATIONAL_HOURS_PER_DAY;

    if total_hours == 0 {
        return AvailabilityReport {
            occupied_hours: 0,
            total_hours: 0,
            percent_free: 100.0,
        };
    }

    let occupied: i64 = reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Confirmed && r.date >= from && r.date <= to)
        .map(|r| occupied_hours(r.start_time, r.end_time))
        .sum();

    let percent_free =
        ((total_hours - occupied) as f64 / total_hours as f64 * 100.0).clamp(0.0, 100.0);

    AvailabilityReport {
        occupied_hours: occupied,
        total_hours,
        percent_free,
    }
}

/// Service for availability reads
#[derive(Clone)]
pub struct AvailabilityService {
    repo: Repository,
}

impl AvailabilityService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Availability of one court over an inclusive date range
    pub async fn for_court(
        &self,
        court_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AvailabilityReport> {
        let reservations = self.repo.list_confirmed_in_range(court_id, from, to).await?;
        Ok(compute_availability(&reservations, from, to))
    }

    /// Availability over the rolling admission window starting today
    pub async fn rolling_window(&self, court_id: i64) -> Result<AvailabilityReport> {
        let from = Utc::now().date_naive();
        let to = from + Duration::days(config::ADMISSION_WINDOW_DAYS);
        self.for_court(court_id, from, to).await
    }

    /// Per-court availability over the rolling window, most free first.
    ///
    /// Courts under maintenance are excluded from the listing.
    pub async fn overview(&self) -> Result<Vec<CourtAvailability>> {
        let courts = self.repo.list_courts().await?;
        let mut entries = Vec::with_capacity(courts.len());

        for court in courts {
            if court.status == CourtStatus::Maintenance {
                continue;
            }
            let report = self.rolling_window(court.id).await?;
            entries.push(CourtAvailability { court, report });
        }

        entries.sort_by(|a, b| b.report.percent_free.total_cmp(&a.report.percent_free));
        Ok(entries)
    }
}
