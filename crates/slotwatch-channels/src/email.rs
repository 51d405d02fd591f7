//! Email sink — SMTP over implicit TLS (port 465) via async lettre.
//!
//! One message per notification, no retries: a failed send surfaces as
//! `SlotWatchError::Notify` and ends the current browser session.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use slotwatch_core::config::EmailConfig;
use slotwatch_core::error::{Result, SlotWatchError};
use slotwatch_core::secrets::Secrets;
use slotwatch_core::traits::Notifier;
use std::time::Duration;

const SMTPS_PORT: u16 = 465;

/// Sends availability reports to the operator.
pub struct EmailNotifier {
    config: EmailConfig,
    secrets: Secrets,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig, secrets: Secrets) -> Self {
        Self { config, secrets }
    }

    /// Build the message without sending it.
    pub fn build_message(&self, subject: &str, body: &str) -> Result<Message> {
        let from_addr = self
            .secrets
            .sender_email
            .parse::<lettre::Address>()
            .map_err(|e| SlotWatchError::Notify(format!("Invalid from: {e}")))?;
        let from = Mailbox::new(Some(self.config.display_name.clone()), from_addr);

        let to = self
            .secrets
            .recipient_email
            .parse::<Mailbox>()
            .map_err(|e| SlotWatchError::Notify(format!("Invalid to: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| SlotWatchError::Notify(format!("Build email: {e}")))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(
            self.secrets.sender_email.clone(),
            self.secrets.auth_code.clone(),
        );

        // 465 is implicit TLS; anything else negotiates STARTTLS.
        let builder = if self.config.smtp_port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
        }
        .map_err(|e| SlotWatchError::Notify(format!("SMTP relay: {e}")))?;

        Ok(builder
            .port(self.config.smtp_port)
            .credentials(creds)
            .timeout(Some(Duration::from_secs(30)))
            .build())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        tracing::info!("📧 Connecting to SMTP server {}", self.config.smtp_host);
        let email = self.build_message(subject, body)?;
        self.transport()?
            .send(email)
            .await
            .map_err(|e| SlotWatchError::Notify(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Availability email sent");
        Ok(())
    }
}
