//! Logging mailer for development.

use crate::error::Result;
use crate::mail::Mailer;
use async_trait::async_trait;

/// Mailer that logs messages instead of sending them.
///
/// Used when no SMTP transport is configured, so the rest of the
/// pipeline behaves exactly as in production.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        tracing::info!(
            to = %to,
            subject = %subject,
            body_len = html_body.len(),
            "Email delivery (development mode, not sent)"
        );
        Ok(())
    }
}
