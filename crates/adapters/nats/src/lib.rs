//! # formflow-adapter-nats
//!
//! NATS JetStream queue bridge.
//!
//! Domain events are published on `{subject_prefix}.{type}` into one stream
//! and consumed through a durable pull consumer with explicit acks. Payloads
//! that fail to decode are terminated so they are never redelivered.
//!
//! ## Dependency rule
//! Depends on `formflow-app` (for the queue ports) and `formflow-domain`.

pub mod bus;
pub mod config;
pub mod error;

pub use bus::{NatsBus, NatsConsumer, NatsProducer};
pub use config::NatsConfig;
pub use error::NatsError;
