//! Email senders: an SMTP relay through `lettre`, and a log-only fallback.

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MessageBuilder};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use formflow_app::ports::EmailSender;
use formflow_domain::email::RenderedEmail;
use formflow_domain::error::ActionExecutionError;

use crate::config::DeliveryConfig;
use crate::error::DeliveryError;

/// Build the MIME message for a rendered email.
///
/// # Errors
///
/// Returns [`DeliveryError::Address`] for any unparsable address.
pub fn build_message(email: &RenderedEmail) -> Result<Message, DeliveryError> {
    let mut builder: MessageBuilder = Message::builder()
        .from(email.from.parse::<Mailbox>()?)
        .to(email.to.parse::<Mailbox>()?)
        .subject(email.subject.clone());
    for cc in &email.cc {
        builder = builder.cc(cc.parse::<Mailbox>()?);
    }
    for bcc in &email.bcc {
        builder = builder.bcc(bcc.parse::<Mailbox>()?);
    }
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(reply_to.parse::<Mailbox>()?);
    }

    let content_type = if email.is_html {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };
    Ok(builder.header(content_type).body(email.body.clone())?)
}

/// Sends through an SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// # Errors
    ///
    /// Returns [`DeliveryError::Smtp`] if the relay settings are unusable.
    pub fn new(host: &str, config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        let builder = if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let builder = builder.port(config.smtp_port);
        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };
        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl EmailSender for SmtpMailer {
    async fn send(&self, email: RenderedEmail) -> Result<(), ActionExecutionError> {
        let message = build_message(&email)?;
        self.transport
            .send(message)
            .await
            .map_err(DeliveryError::from)?;
        tracing::info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Logs emails instead of sending them. Used when no relay is configured.
#[derive(Clone, Default)]
pub struct LogMailer;

impl EmailSender for LogMailer {
    async fn send(&self, email: RenderedEmail) -> Result<(), ActionExecutionError> {
        build_message(&email)?;
        tracing::info!(to = %email.to, subject = %email.subject, "email not sent, no SMTP relay configured");
        Ok(())
    }
}

/// Either sender, picked from configuration.
#[derive(Clone)]
pub enum Mailer {
    Smtp(SmtpMailer),
    Log(LogMailer),
}

impl Mailer {
    /// # Errors
    ///
    /// See [`SmtpMailer::new`].
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        match &config.smtp_host {
            Some(host) => Ok(Self::Smtp(SmtpMailer::new(host, config)?)),
            None => Ok(Self::Log(LogMailer)),
        }
    }
}

impl EmailSender for Mailer {
    async fn send(&self, email: RenderedEmail) -> Result<(), ActionExecutionError> {
        match self {
            Self::Smtp(mailer) => mailer.send(email).await,
            Self::Log(mailer) => mailer.send(email).await,
        }
    }
}
