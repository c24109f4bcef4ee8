//! # formflow-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `PipelineRepository`: durable rule store, indexed by trigger type and form
//!   - `EventRepository` / `IdentityLookup`: organizer and caller directory
//!   - `ExecutionLog`, `AccessGrantRepository`, `TimerStore`: dispatch bookkeeping
//!   - `EmailSender`, `WebhookClient`: outbound delivery
//!   - `EventProducer`, `EventConsumer`: queue bridge
//! - Define **driving/inbound** use-cases:
//!   - `PipelineService`: authorized create, get, update, delete, list
//!   - `PipelineEngine`: consume, match, dispatch, ack
//!   - `TimerScheduler`: fire expiration and reminder timers
//! - Provide an **in-process broker** that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `formflow-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod broker;
pub mod dispatcher;
pub mod engine;
pub mod matcher;
pub mod ports;
pub mod scheduler;
pub mod services;

#[cfg(test)]
mod fakes;
