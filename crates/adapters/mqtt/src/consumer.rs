//! Consuming half of the MQTT bridge.
//!
//! Runs with manual acks at QoS 1. MQTT 3.1.1 has no negative ack, so a nack
//! republishes the payload on its original topic and acks the original.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};

use formflow_app::ports::{Delivery, EventConsumer};
use formflow_domain::domain_event::DomainEvent;
use formflow_domain::error::FormflowError;

use crate::config::MqttConfig;
use crate::error::MqttError;

/// The received packet, needed to ack or republish it.
#[derive(Debug)]
pub struct MqttReceipt(Publish);

pub struct MqttConsumer {
    client: AsyncClient,
    eventloop: EventLoop,
    subscription: String,
}

impl MqttConsumer {
    /// Build consumer number `index`. Nothing touches the network until the
    /// first call to [`EventConsumer::next`].
    #[must_use]
    pub fn new(config: &MqttConfig, index: usize) -> Self {
        let mut options = MqttOptions::new(
            format!("{}-consumer-{index}", config.client_id),
            config.broker_host.clone(),
            config.broker_port,
        );
        options
            .set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)))
            .set_manual_acks(true)
            .set_clean_session(false);

        let (client, eventloop) = AsyncClient::new(options, 64);
        Self {
            client,
            eventloop,
            subscription: config.subscription(),
        }
    }

    async fn subscribe(client: AsyncClient, subscription: String) -> Result<(), MqttError> {
        client
            .subscribe(subscription, QoS::AtLeastOnce)
            .await
            .map_err(MqttError::Client)
    }
}

impl EventConsumer for MqttConsumer {
    type Receipt = MqttReceipt;

    async fn next(&mut self) -> Result<Option<Delivery<MqttReceipt>>, FormflowError> {
        loop {
            let event = self.eventloop.poll().await.map_err(MqttError::Connection)?;
            match event {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    tracing::info!(session_present = ack.session_present, "mqtt consumer connected");
                    if !ack.session_present {
                        Self::subscribe(self.client.clone(), self.subscription.clone()).await?;
                    }
                }
                Event::Incoming(Packet::Publish(publish)) => {
                    match serde_json::from_slice::<DomainEvent>(&publish.payload) {
                        Ok(event) => {
                            return Ok(Some(Delivery {
                                event,
                                receipt: MqttReceipt(publish),
                            }));
                        }
                        Err(err) => {
                            tracing::warn!(topic = ?publish.topic, error = %err, "dropping undecodable payload");
                            self.client
                                .ack(&publish)
                                .await
                                .map_err(MqttError::Client)?;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    async fn ack(&mut self, receipt: MqttReceipt) -> Result<(), FormflowError> {
        self.client
            .ack(&receipt.0)
            .await
            .map_err(MqttError::Client)?;
        Ok(())
    }

    async fn nack(&mut self, receipt: MqttReceipt) -> Result<(), FormflowError> {
        let MqttReceipt(publish) = receipt;
        self.client
            .publish_bytes(
                publish.topic.clone(),
                QoS::AtLeastOnce,
                false,
                publish.payload.clone(),
            )
            .await
            .map_err(MqttError::Client)?;
        self.client.ack(&publish).await.map_err(MqttError::Client)?;
        Ok(())
    }
}
