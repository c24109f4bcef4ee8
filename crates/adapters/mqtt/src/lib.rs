//! # formflow-adapter-mqtt
//!
//! MQTT queue bridge: carries domain events between edge producers and the
//! pipeline engine through an MQTT broker.
//!
//! ## Responsibilities
//! - Publish domain events as JSON at QoS 1 ([`MqttProducer`])
//! - Consume them with manual acks, optionally through a shared
//!   subscription so parallel consumers split the stream ([`MqttConsumer`])
//! - Drop payloads that do not decode, after logging them
//!
//! ## Dependency rule
//! Same as other adapters: depends on `formflow-app` and `formflow-domain`.

pub mod config;
pub mod consumer;
pub mod error;
pub mod producer;

pub use config::MqttConfig;
pub use consumer::{MqttConsumer, MqttReceipt};
pub use error::MqttError;
pub use producer::MqttProducer;
