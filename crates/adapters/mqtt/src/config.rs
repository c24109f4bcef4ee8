//! MQTT broker configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the MQTT queue bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// Client identifier prefix; consumers append their index.
    pub client_id: String,
    /// Base topic prefix; events go to `{base_topic}/events/{type}`.
    pub base_topic: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Shared-subscription group, so parallel consumers split the stream.
    pub shared_group: Option<String>,
    /// How long a publish waits for the broker's `PubAck`.
    pub publish_timeout_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "formflow".to_string(),
            base_topic: "formflow".to_string(),
            keep_alive_secs: 30,
            shared_group: Some("formflow-engine".to_string()),
            publish_timeout_secs: 5,
        }
    }
}

impl MqttConfig {
    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Topic a domain event of type `discriminator` is published on.
    #[must_use]
    pub fn event_topic(&self, discriminator: &str) -> String {
        format!("{}/events/{discriminator}", self.base_topic)
    }

    /// Filter consumers subscribe to.
    #[must_use]
    pub fn subscription(&self) -> String {
        let filter = format!("{}/events/+", self.base_topic);
        match &self.shared_group {
            Some(group) => format!("$share/{group}/{filter}"),
            None => filter,
        }
    }
}
