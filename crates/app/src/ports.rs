//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod delivery;
pub mod directory;
pub mod execution;
pub mod pipeline_repo;
pub mod queue;

pub use delivery::{EmailSender, WebhookClient, WebhookRequest};
pub use directory::{EmailTemplateRepository, EventRepository, IdentityLookup};
pub use execution::{AccessGrantRepository, ExecutionLog, TimerStore};
pub use pipeline_repo::PipelineRepository;
pub use queue::{Delivery, EventConsumer, EventProducer};
