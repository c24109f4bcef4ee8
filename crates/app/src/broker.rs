//! In-process broker backed by a tokio [`mpsc`] channel.
//!
//! Behaves like a work queue: each published event is handed to exactly one
//! consumer, and a nacked delivery is put back at the end of the queue.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use formflow_domain::domain_event::DomainEvent;
use formflow_domain::error::{FormflowError, PublishError};

use crate::ports::{Delivery, EventConsumer, EventProducer};

/// Single-process queue bridge, used when `broker.kind = "memory"` and in tests.
#[derive(Clone)]
pub struct InProcessBroker {
    sender: mpsc::UnboundedSender<DomainEvent>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<DomainEvent>>>,
}

impl Default for InProcessBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessBroker {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// A consumer sharing this broker's queue. Consumers compete for events.
    #[must_use]
    pub fn consumer(&self) -> InProcessConsumer {
        InProcessConsumer {
            receiver: Arc::clone(&self.receiver),
            requeue: self.sender.clone(),
        }
    }
}

impl EventProducer for InProcessBroker {
    fn publish(
        &self,
        event: DomainEvent,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        let result: Result<(), FormflowError> = self.sender.send(event).map_err(|err| {
            PublishError {
                event_type: err.0.discriminator(),
                source: "in-process queue is closed".into(),
            }
            .into()
        });
        async { result }
    }
}

/// Holds the event so a nack can put it back.
#[derive(Debug)]
pub struct InProcessReceipt(DomainEvent);

pub struct InProcessConsumer {
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<DomainEvent>>>,
    requeue: mpsc::UnboundedSender<DomainEvent>,
}

impl EventConsumer for InProcessConsumer {
    type Receipt = InProcessReceipt;

    fn next(
        &mut self,
    ) -> impl Future<Output = Result<Option<Delivery<Self::Receipt>>, FormflowError>> + Send {
        let receiver = Arc::clone(&self.receiver);
        async move {
            let event = receiver.lock().await.recv().await;
            Ok(event.map(|event| Delivery {
                event: event.clone(),
                receipt: InProcessReceipt(event),
            }))
        }
    }

    fn ack(
        &mut self,
        _receipt: Self::Receipt,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        async { Ok(()) }
    }

    fn nack(
        &mut self,
        receipt: Self::Receipt,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        let result: Result<(), FormflowError> = self.requeue.send(receipt.0).map_err(|err| {
            PublishError {
                event_type: err.0.discriminator(),
                source: "in-process queue is closed".into(),
            }
            .into()
        });
        async { result }
    }
}
