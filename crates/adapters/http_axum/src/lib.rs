//! # formflow-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the pipeline CRUD API (`/api/pipelines`, `/api/events/{id}/pipelines`)
//!   gated by the authorization guard
//! - Serve the edge endpoints that turn form submissions and field changes
//!   into domain events on the broker
//! - Resolve `Authorization: Bearer` tokens into a caller identity
//! - Map [`FormflowError`](formflow_domain::error::FormflowError) variants to
//!   HTTP status codes
//!
//! ## Dependency rule
//! Depends on `formflow-app` (for port traits and services) and
//! `formflow-domain` (for request/response types). Never leaks axum types
//! into the domain.

pub mod api;
pub mod auth;
pub mod error;
pub mod router;
pub mod state;
