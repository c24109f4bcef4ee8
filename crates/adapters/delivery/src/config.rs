//! Delivery configuration: webhook client and SMTP relay.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Upper bound for a single webhook call, connection included.
    pub webhook_timeout_secs: u64,
    /// SMTP relay. Without it emails are only logged.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Upgrade the connection with STARTTLS. Disable for local catch-all relays.
    pub smtp_starttls: bool,
    /// Sender address of access-expiry reminders.
    pub reminder_from: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_timeout_secs: 10,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_starttls: true,
            reminder_from: "no-reply@formflow.local".to_string(),
        }
    }
}

impl DeliveryConfig {
    #[must_use]
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}
