//! Broker backend selected at startup from `broker.kind`.

use formflow_adapter_mqtt::MqttProducer;
use formflow_adapter_nats::NatsProducer;
use formflow_app::broker::InProcessBroker;
use formflow_app::ports::EventProducer;
use formflow_domain::domain_event::DomainEvent;
use formflow_domain::error::FormflowError;

/// Producer half handed to the HTTP edge endpoints.
pub enum Producer {
    Mqtt(MqttProducer),
    Nats(NatsProducer),
    Memory(InProcessBroker),
}

impl EventProducer for Producer {
    async fn publish(&self, event: DomainEvent) -> Result<(), FormflowError> {
        match self {
            Self::Mqtt(inner) => inner.publish(event).await,
            Self::Nats(inner) => inner.publish(event).await,
            Self::Memory(inner) => inner.publish(event).await,
        }
    }
}
