//! NATS adapter error types.

use formflow_domain::error::FormflowError;

#[derive(Debug, thiserror::Error)]
pub enum NatsError {
    /// No configured server accepted the connection.
    #[error("failed to connect to NATS")]
    Connect(#[source] async_nats::ConnectError),

    /// A JetStream request (stream, consumer, publish, ack) failed.
    #[error("JetStream {operation} failed")]
    JetStream {
        operation: &'static str,
        #[source]
        source: async_nats::Error,
    },

    /// Failed to encode a domain event.
    #[error("failed to serialize NATS payload")]
    Payload(#[source] serde_json::Error),
}

impl NatsError {
    pub(crate) fn jetstream<E>(operation: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |err| Self::JetStream {
            operation,
            source: Box::new(err),
        }
    }
}

impl From<NatsError> for FormflowError {
    fn from(err: NatsError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_name_failed_operation() {
        let err = NatsError::jetstream("ack")(std::io::Error::other("gone"));
        assert_eq!(err.to_string(), "JetStream ack failed");
    }

    #[test]
    fn should_convert_to_storage_error() {
        let err: FormflowError = NatsError::jetstream("ack")(std::io::Error::other("gone")).into();
        assert!(matches!(err, FormflowError::Storage(_)));
    }
}
