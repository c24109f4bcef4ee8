//! # formflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the persistence port traits defined in `formflow-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `formflow-app` (for port traits) and `formflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;
mod error;

pub mod access_grant_repo;
pub mod email_template_repo;
pub mod event_repo;
pub mod execution_log;
pub mod pipeline_repo;
pub mod pool;
pub mod timer_store;
pub mod token_repo;

pub use access_grant_repo::SqliteAccessGrantRepository;
pub use email_template_repo::SqliteEmailTemplateRepository;
pub use error::StorageError;
pub use event_repo::SqliteEventRepository;
pub use execution_log::SqliteExecutionLog;
pub use pipeline_repo::SqlitePipelineRepository;
pub use pool::{Config, Database};
pub use timer_store::SqliteTimerStore;
pub use token_repo::SqliteTokenRepository;
