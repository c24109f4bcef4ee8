//! JetStream-backed queue bridge.
//!
//! Every engine instance binds to the same durable pull consumer, so a
//! message is handed to one of them at a time and redelivered after a nak or
//! once `ack_wait` elapses.

use async_nats::jetstream::{self, AckKind, consumer::pull, stream};
use futures::StreamExt;

use formflow_app::ports::{Delivery, EventConsumer, EventProducer};
use formflow_domain::domain_event::DomainEvent;
use formflow_domain::error::{FormflowError, PublishError};

use crate::config::NatsConfig;
use crate::error::NatsError;

/// Connection shared by the producer and every consumer.
#[derive(Clone)]
pub struct NatsBus {
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsBus {
    /// Connect and make sure the event stream exists.
    ///
    /// # Errors
    ///
    /// Returns [`NatsError`] if no server is reachable or the stream cannot
    /// be created.
    pub async fn connect(config: NatsConfig) -> Result<Self, NatsError> {
        let urls = config.urls.join(",");
        tracing::info!(urls = %urls, "connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .connect(urls.as_str())
            .await
            .map_err(NatsError::Connect)?;
        let jetstream = jetstream::new(client);

        jetstream
            .get_or_create_stream(stream::Config {
                name: config.stream_name.clone(),
                subjects: vec![config.wildcard()],
                retention: stream::RetentionPolicy::Limits,
                max_age: config.max_age(),
                storage: stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(NatsError::jetstream("stream setup"))?;

        tracing::info!(stream = %config.stream_name, "JetStream ready");
        Ok(Self { jetstream, config })
    }

    #[must_use]
    pub fn producer(&self) -> NatsProducer {
        NatsProducer { bus: self.clone() }
    }

    /// Bind a new consumer to the shared durable consumer.
    ///
    /// # Errors
    ///
    /// Returns [`NatsError`] if the consumer cannot be created or opened.
    pub async fn consumer(&self) -> Result<NatsConsumer, NatsError> {
        let consumer = self
            .jetstream
            .create_consumer_on_stream(
                pull::Config {
                    durable_name: Some(self.config.consumer_name.clone()),
                    filter_subject: self.config.wildcard(),
                    ack_wait: self.config.ack_wait(),
                    max_deliver: self.config.max_deliver,
                    ..Default::default()
                },
                self.config.stream_name.as_str(),
            )
            .await
            .map_err(NatsError::jetstream("consumer setup"))?;

        let messages = consumer
            .messages()
            .await
            .map_err(NatsError::jetstream("pull"))?;
        Ok(NatsConsumer { messages })
    }
}

#[derive(Clone)]
pub struct NatsProducer {
    bus: NatsBus,
}

impl EventProducer for NatsProducer {
    async fn publish(&self, event: DomainEvent) -> Result<(), FormflowError> {
        let event_type = event.discriminator();
        let payload = serde_json::to_vec(&event).map_err(NatsError::Payload)?;
        let publish_error = |err: NatsError| PublishError {
            event_type,
            source: Box::new(err),
        };

        self.bus
            .jetstream
            .publish(self.bus.config.subject(event_type), payload.into())
            .await
            .map_err(NatsError::jetstream("publish"))
            .map_err(publish_error)?
            .await
            .map_err(NatsError::jetstream("publish ack"))
            .map_err(publish_error)?;

        tracing::debug!(occurrence_id = %event.id, event_type, "event published");
        Ok(())
    }
}

pub struct NatsConsumer {
    messages: pull::Stream,
}

impl EventConsumer for NatsConsumer {
    type Receipt = jetstream::Message;

    async fn next(&mut self) -> Result<Option<Delivery<jetstream::Message>>, FormflowError> {
        loop {
            let Some(message) = self.messages.next().await else {
                return Ok(None);
            };
            let message = message.map_err(NatsError::jetstream("pull"))?;

            match serde_json::from_slice::<DomainEvent>(&message.payload) {
                Ok(event) => {
                    return Ok(Some(Delivery {
                        event,
                        receipt: message,
                    }));
                }
                Err(err) => {
                    tracing::warn!(subject = %message.subject, error = %err, "terminating undecodable message");
                    message
                        .ack_with(AckKind::Term)
                        .await
                        .map_err(|err| NatsError::JetStream {
                            operation: "term",
                            source: err,
                        })?;
                }
            }
        }
    }

    async fn ack(&mut self, receipt: jetstream::Message) -> Result<(), FormflowError> {
        receipt.ack().await.map_err(|err| NatsError::JetStream {
            operation: "ack",
            source: err,
        })?;
        Ok(())
    }

    async fn nack(&mut self, receipt: jetstream::Message) -> Result<(), FormflowError> {
        receipt
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|err| NatsError::JetStream {
                operation: "nak",
                source: err,
            })?;
        Ok(())
    }
}
