//! Outbound email delivery
//!
//! The [`Mailer`] trait abstracts over the SMTP transport so services
//! and tests can swap in non-network implementations.

pub mod log;
pub mod memory;
pub mod smtp;
pub mod templates;

pub use log::LogMailer;
pub use memory::MemoryMailer;
pub use smtp::{SmtpConfig, SmtpMailer};
pub use templates::{render_email, EmailContext};

use crate::error::Result;
use async_trait::async_trait;

/// Email delivery backend.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send an HTML email.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the message or the
    /// recipient address is invalid.
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}
