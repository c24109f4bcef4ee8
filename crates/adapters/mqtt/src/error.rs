//! MQTT adapter error types.

use formflow_domain::error::FormflowError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client refused a request (its event loop is gone).
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The connection to the broker failed or dropped.
    #[error("MQTT connection error")]
    Connection(#[source] rumqttc::ConnectionError),

    /// No broker session, or it dropped before the publish was acknowledged.
    #[error("MQTT broker not connected")]
    Disconnected,

    /// The broker did not acknowledge a publish in time.
    #[error("MQTT publish not acknowledged in time")]
    AckTimeout,

    /// Failed to encode or decode a domain event payload.
    #[error("failed to (de)serialize MQTT payload")]
    Payload(#[source] serde_json::Error),
}

impl From<MqttError> for FormflowError {
    fn from(err: MqttError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_payload_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err();
        let err = MqttError::Payload(json_err);
        assert_eq!(err.to_string(), "failed to (de)serialize MQTT payload");
    }

    #[test]
    fn should_display_disconnected_error() {
        assert_eq!(MqttError::Disconnected.to_string(), "MQTT broker not connected");
    }

    #[test]
    fn should_convert_to_storage_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err();
        let err: FormflowError = MqttError::Payload(json_err).into();
        assert!(matches!(err, FormflowError::Storage(_)));
    }
}
