//! # formflow-domain
//!
//! Pure domain model for the formflow pipeline engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Pipelines** (trigger event → ordered actions) and the closed
//!   registry that decodes and validates their tagged variants
//! - Define **Domain events** (form submitted, field changed) carried by the broker
//! - Define the platform **Event** and its organizer set
//! - Define execution bookkeeping, **access grants**, durable **timers** and
//!   **email templates**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod access;
pub mod domain_event;
pub mod email;
pub mod event;
pub mod execution;
pub mod pipeline;
pub mod timer;
