//! Publishing half of the MQTT bridge.
//!
//! `AsyncClient::publish` only queues a request for the event loop, so the
//! producer tracks the connection and waits for the broker's `PubAck` before
//! reporting success. While disconnected, publishing fails immediately.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use formflow_app::ports::EventProducer;
use formflow_domain::domain_event::DomainEvent;
use formflow_domain::error::{FormflowError, PublishError};

use crate::config::MqttConfig;
use crate::error::MqttError;

type Waiter = oneshot::Sender<Result<(), MqttError>>;

/// Publishes domain events at QoS 1 on `{base_topic}/events/{type}`.
#[derive(Clone)]
pub struct MqttProducer {
    client: AsyncClient,
    config: MqttConfig,
    link: Arc<Link>,
}

impl MqttProducer {
    /// Create the client and spawn the task driving its event loop.
    ///
    /// The task ends once every clone of the producer is dropped.
    #[must_use]
    pub fn connect(config: MqttConfig) -> (Self, JoinHandle<()>) {
        let mut options = MqttOptions::new(
            format!("{}-producer", config.client_id),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));

        let (client, eventloop) = AsyncClient::new(options, 64);
        let link = Arc::new(Link::default());
        let handle = tokio::spawn(drive(eventloop, Arc::clone(&link)));
        (
            Self {
                client,
                config,
                link,
            },
            handle,
        )
    }

    /// Whether the driver currently holds a broker session.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    async fn send(&self, topic: String, payload: Vec<u8>) -> Result<(), MqttError> {
        if !self.link.is_connected() {
            return Err(MqttError::Disconnected);
        }
        let ack = self.link.enqueue(|| {
            self.client
                .try_publish(topic, QoS::AtLeastOnce, false, payload)
                .map_err(MqttError::Client)
        })?;

        match tokio::time::timeout(self.config.publish_timeout(), ack).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MqttError::Disconnected),
            Err(_) => Err(MqttError::AckTimeout),
        }
    }
}

/// Connection state and outstanding publishes, shared with the driver task.
///
/// Waiters move from `queued` to `sent` when the event loop assigns their
/// packet id, in the same order the requests were queued.
struct Link {
    connected: watch::Sender<bool>,
    inflight: Mutex<Inflight>,
}

#[derive(Default)]
struct Inflight {
    queued: VecDeque<Waiter>,
    sent: HashMap<u16, Waiter>,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            connected: watch::channel(false).0,
            inflight: Mutex::new(Inflight::default()),
        }
    }
}

impl Link {
    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn inflight(&self) -> std::sync::MutexGuard<'_, Inflight> {
        self.inflight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a waiter and queue its request while holding the lock, so
    /// waiters stay in request order.
    fn enqueue(
        &self,
        request: impl FnOnce() -> Result<(), MqttError>,
    ) -> Result<oneshot::Receiver<Result<(), MqttError>>, MqttError> {
        let (tx, rx) = oneshot::channel();
        let mut inflight = self.inflight();
        inflight.queued.push_back(tx);
        if let Err(err) = request() {
            inflight.queued.pop_back();
            return Err(err);
        }
        Ok(rx)
    }

    fn connected(&self) {
        self.connected.send_replace(true);
    }

    fn sent(&self, pkid: u16) {
        let mut inflight = self.inflight();
        if let Some(waiter) = inflight.queued.pop_front() {
            inflight.sent.insert(pkid, waiter);
        }
    }

    fn acked(&self, pkid: u16) {
        if let Some(waiter) = self.inflight().sent.remove(&pkid) {
            let _ = waiter.send(Ok(()));
        }
    }

    /// A clean session drops every unacknowledged publish, so all waiters fail.
    fn disconnected(&self) {
        self.connected.send_replace(false);
        let mut guard = self.inflight();
        let inflight = &mut *guard;
        let waiters = inflight
            .queued
            .drain(..)
            .chain(inflight.sent.drain().map(|(_, waiter)| waiter))
            .collect::<Vec<_>>();
        for waiter in waiters {
            let _ = waiter.send(Err(MqttError::Disconnected));
        }
    }
}

async fn drive(mut eventloop: EventLoop, link: Arc<Link>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("mqtt producer connected");
                link.connected();
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => link.sent(pkid),
            Ok(Event::Incoming(Packet::PubAck(ack))) => link.acked(ack.pkid),
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                tracing::debug!("mqtt producer closed");
                link.disconnected();
                break;
            }
            Err(err) => {
                tracing::warn!(error = %err, "mqtt producer connection error, reconnecting");
                link.disconnected();
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

impl EventProducer for MqttProducer {
    async fn publish(&self, event: DomainEvent) -> Result<(), FormflowError> {
        let event_type = event.discriminator();
        let payload = serde_json::to_vec(&event).map_err(MqttError::Payload)?;
        let topic = self.config.event_topic(event_type);

        self.send(topic, payload)
            .await
            .map_err(|err| PublishError {
                event_type,
                source: Box::new(err),
            })?;
        tracing::debug!(occurrence_id = %event.id, event_type, "event published");
        Ok(())
    }
}
