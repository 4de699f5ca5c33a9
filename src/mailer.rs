//! Outbound mail.
//!
//! [`Mailer`] is the dispatcher every handler and sweep goes through. Delivery is
//! best-effort: transport failures are logged and swallowed, never retried and never
//! reported to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use tracing::{error, info, warn};

use crate::config::SmtpConfig;
use crate::errors::{AcademyError, AcademyResult};
use crate::formatter::Formatter;
use crate::notifications::Notification;

/// One message, addressed jointly to every recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Something that can hand a message to a mail server.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> AcademyResult<()>;
}

/// SMTP delivery over STARTTLS.
#[derive(Clone)]
pub struct SmtpMailTransport {
    transport: SmtpTransport,
}

impl SmtpMailTransport {
    pub fn from_config(config: &SmtpConfig) -> AcademyResult<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let transport = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| AcademyError::ConfigError(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self { transport })
    }

    fn build_message(mail: &OutgoingMail) -> AcademyResult<Message> {
        let from: Mailbox = mail
            .from
            .parse()
            .map_err(|e| AcademyError::MailError(format!("invalid from address: {e}")))?;

        let mut builder = Message::builder().from(from).subject(mail.subject.as_str());
        for address in &mail.to {
            let to: Mailbox = address.parse().map_err(|e| {
                AcademyError::MailError(format!("invalid recipient '{address}': {e}"))
            })?;
            builder = builder.to(to);
        }

        builder
            .header(ContentType::TEXT_HTML)
            .body(mail.html.clone())
            .map_err(|e| AcademyError::MailError(format!("failed to build message: {e}")))
    }
}

impl std::fmt::Debug for SmtpMailTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, mail: OutgoingMail) -> AcademyResult<()> {
        let message = Self::build_message(&mail)?;
        let transport = self.transport.clone();

        // lettre's SmtpTransport is blocking.
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| AcademyError::MailError(format!("send task failed: {e}")))?
            .map_err(|e| AcademyError::MailError(format!("SMTP delivery failed: {e}")))?;

        Ok(())
    }
}

/// Formats notifications and hands them to the transport.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    formatter: Formatter,
    from: String,
}

impl Mailer {
    /// `sender_address` is the SMTP account; the display name is the academy's.
    pub fn new(transport: Arc<dyn MailTransport>, formatter: Formatter, sender_address: &str) -> Self {
        let from = format!("{} <{}>", formatter.academy_name(), sender_address);
        Self {
            transport,
            formatter,
            from,
        }
    }

    /// Send one message to all `recipients`.
    ///
    /// An empty recipient list is a logged no-op. Transport errors are logged and
    /// dropped.
    pub async fn dispatch(&self, recipients: &[String], subject: &str, html: &str) {
        if recipients.is_empty() {
            warn!(subject = %subject, "No recipients provided for email");
            return;
        }

        let joined = recipients.join(", ");
        let mail = OutgoingMail {
            from: self.from.clone(),
            to: recipients.to_vec(),
            subject: subject.to_string(),
            html: html.to_string(),
        };

        match self.transport.send(mail).await {
            Ok(()) => info!(recipients = %joined, "Email sent"),
            Err(e) => error!(recipients = %joined, error = %e, "Failed to send email"),
        }
    }

    /// Format `notification` and dispatch it to the student and, when known, the guardian.
    pub async fn notify(&self, notification: &Notification) {
        let rendered = self.formatter.format(notification);
        let recipients = notification.recipient().addresses();
        self.dispatch(&recipients, &rendered.subject, &rendered.html)
            .await;
    }
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("from", &self.from)
            .field("formatter", &self.formatter)
            .finish()
    }
}
