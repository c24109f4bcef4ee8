//! NATS JetStream configuration.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Server URLs, tried in order.
    pub urls: Vec<String>,
    /// JetStream stream holding domain events.
    pub stream_name: String,
    /// Durable pull consumer shared by every engine instance.
    pub consumer_name: String,
    /// Events are published on `{subject_prefix}.{type}`.
    pub subject_prefix: String,
    /// How long the server waits for an ack before redelivering.
    pub ack_wait_secs: u64,
    /// Delivery attempts per message; `-1` means unlimited.
    pub max_deliver: i64,
    /// How long stored events are kept, in hours.
    pub max_age_hours: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            urls: vec!["nats://localhost:4222".to_string()],
            stream_name: "FORMFLOW_EVENTS".to_string(),
            consumer_name: "formflow-engine".to_string(),
            subject_prefix: "formflow.events".to_string(),
            ack_wait_secs: 30,
            max_deliver: -1,
            max_age_hours: 24 * 7,
        }
    }
}

impl NatsConfig {
    #[must_use]
    pub fn subject(&self, discriminator: &str) -> String {
        format!("{}.{discriminator}", self.subject_prefix)
    }

    /// Wildcard covering every event subject.
    #[must_use]
    pub fn wildcard(&self) -> String {
        format!("{}.>", self.subject_prefix)
    }

    #[must_use]
    pub fn ack_wait(&self) -> Duration {
        Duration::from_secs(self.ack_wait_secs)
    }

    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 3600)
    }
}
