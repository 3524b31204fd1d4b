//! Services module
//!
//! Business logic services that coordinate between the daemon and repository.

pub mod availability;
pub mod notifications;
pub mod reminders;
pub mod reservations;
pub mod scheduler;
pub mod worker;

pub use availability::AvailabilityService;
pub use notifications::NotificationService;
pub use reminders::ReminderScheduler;
pub use reservations::ReservationService;
pub use scheduler::JobRunner;
pub use worker::{NotificationWorker, WorkerHandle};
