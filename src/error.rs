//! Error types for the booking core
//!
//! All errors use thiserror for structured error handling.
//! Admission-control and validation variants are returned to the caller;
//! delivery and scheduling variants are caught and logged at the service
//! boundary so a booking never fails because of a notification problem.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Court {0} is under maintenance")]
    Maintenance(i64),

    #[error("Court {0} is fully booked for the next {1} days")]
    FullyBooked(i64, i64),

    #[error("Requested slot overlaps an existing reservation on court {0}")]
    Conflict(i64),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, i64),

    #[error("User {0} may not modify reservation {1}")]
    Forbidden(i64, i64),

    #[error("Reservation {0} is today or in the past and can no longer be cancelled")]
    TooLate(i64),

    #[error("Illegal reservation transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Scheduling error: {0}")]
    Scheduling(String),
}

pub type Result<T> = std::result::Result<T, BookingError>;
