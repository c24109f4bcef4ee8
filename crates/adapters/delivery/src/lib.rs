//! # formflow-adapter-delivery
//!
//! Outbound side effects of pipeline actions.
//!
//! - [`ReqwestWebhookClient`] implements `WebhookClient` with a bounded timeout
//! - [`SmtpMailer`] implements `EmailSender` over an SMTP relay; [`LogMailer`]
//!   stands in when no relay is configured
//!
//! Failures are reported as `ActionExecutionError`, never as panics, so the
//! dispatcher can record them and move on to the next action.

pub mod config;
pub mod error;
pub mod smtp;
pub mod webhook;

pub use config::DeliveryConfig;
pub use error::DeliveryError;
pub use smtp::{LogMailer, Mailer, SmtpMailer};
pub use webhook::ReqwestWebhookClient;
