//! Queue bridge ports: publish domain events onto a broker and consume
//! them back with explicit acknowledgement.
//!
//! Backends (in-process, MQTT, NATS) implement both halves; the engine only
//! sees these traits.

use std::future::Future;

use formflow_domain::domain_event::DomainEvent;
use formflow_domain::error::FormflowError;

/// Producer half, used by edge producers (form submission, field change).
pub trait EventProducer {
    /// Publish one occurrence.
    ///
    /// Broker failures surface as [`FormflowError::Publish`] so the caller
    /// can decide whether to fail its own request.
    fn publish(&self, event: DomainEvent)
    -> impl Future<Output = Result<(), FormflowError>> + Send;
}

impl<T: EventProducer + Send + Sync> EventProducer for std::sync::Arc<T> {
    fn publish(
        &self,
        event: DomainEvent,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        (**self).publish(event)
    }
}

/// One decoded message together with whatever the backend needs to settle it.
#[derive(Debug)]
pub struct Delivery<R> {
    pub event: DomainEvent,
    pub receipt: R,
}

/// Consumer half: a restartable, at-least-once stream of domain events.
///
/// Payloads that cannot be decoded are logged and settled by the backend
/// itself; they never reach the caller.
pub trait EventConsumer: Send {
    /// Backend-specific handle used to settle a delivery.
    type Receipt: Send;

    /// Wait for the next delivery. `Ok(None)` means the stream is closed for
    /// good; an `Err` is transient and the caller may call `next` again.
    fn next(
        &mut self,
    ) -> impl Future<Output = Result<Option<Delivery<Self::Receipt>>, FormflowError>> + Send;

    /// The delivery was fully handled; the broker may forget it.
    fn ack(
        &mut self,
        receipt: Self::Receipt,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send;

    /// The delivery could not be handled; ask for redelivery.
    fn nack(
        &mut self,
        receipt: Self::Receipt,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send;
}
