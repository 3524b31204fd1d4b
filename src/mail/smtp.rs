//! SMTP mailer implementation using Lettre.

use crate::error::{BookingError, Result};
use crate::mail::Mailer;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// SMTP connection settings.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    /// SMTP server address (e.g. "smtp.gmail.com")
    pub host: String,
    /// SMTP server port, usually 587 for STARTTLS
    pub port: u16,
    /// Authentication username
    pub username: String,
    /// Authentication password
    pub password: String,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
}

impl SmtpConfig {
    /// Read settings from `COURTBOOK_SMTP_*` environment variables.
    ///
    /// Returns `None` when `COURTBOOK_SMTP_HOST` is unset, which callers
    /// treat as "no SMTP configured".
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("COURTBOOK_SMTP_HOST").ok()?;
        let port = std::env::var("COURTBOOK_SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        let username = std::env::var("COURTBOOK_SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("COURTBOOK_SMTP_PASSWORD").unwrap_or_default();
        let from_email =
            std::env::var("COURTBOOK_SMTP_FROM").unwrap_or_else(|_| "noreply@courtbook.local".into());
        let from_name =
            std::env::var("COURTBOOK_SMTP_FROM_NAME").unwrap_or_else(|_| "Courtbook".into());

        Some(Self {
            host,
            port,
            username,
            password,
            from_email,
            from_name,
        })
    }
}

/// Mailer that sends real email over SMTP.
#[derive(Clone)]
pub struct SmtpMailer {
    config: SmtpConfig,
    credentials: Credentials,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        Self {
            config,
            credentials,
        }
    }

    /// Build a transport for one send.
    ///
    /// A fresh transport per message avoids connection pooling issues
    /// with relays that drop idle connections.
    fn build_transport(&self) -> Result<SmtpTransport> {
        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| BookingError::Delivery(format!("SMTP relay error: {e}")))?
            .port(self.config.port)
            .credentials(self.credentials.clone())
            .build();

        Ok(transport)
    }

    fn from_header(&self) -> String {
        format!("{} <{}>", self.config.from_name, self.config.from_email)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from_header()
                    .parse()
                    .map_err(|e| BookingError::Delivery(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| BookingError::Delivery(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| BookingError::Delivery(format!("Failed to build email: {e}")))?;

        let mailer = self.build_transport()?;

        // Lettre's blocking transport runs off the async runtime
        tokio::task::spawn_blocking(move || {
            mailer
                .send(&email)
                .map_err(|e| BookingError::Delivery(format!("Failed to send email: {e}")))
        })
        .await
        .map_err(|e| BookingError::Delivery(format!("Email task failed: {e}")))?
        .map(|_| ())
    }
}
