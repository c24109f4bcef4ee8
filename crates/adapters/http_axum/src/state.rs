//! Shared application state for axum handlers.

use std::sync::Arc;

use formflow_app::ports::{EventProducer, EventRepository, IdentityLookup, PipelineRepository};
use formflow_app::services::pipeline_service::PipelineService;

/// Application state shared across all axum handlers.
///
/// Generic over the rule store, event directory, identity lookup and
/// event producer to avoid dynamic dispatch. `Clone` is implemented manually
/// so the underlying types themselves do not need to be `Clone`.
pub struct AppState<R, E, I, P> {
    /// Organizer-gated pipeline CRUD.
    pub pipelines: Arc<PipelineService<R, E>>,
    /// Bearer token resolution.
    pub identity: Arc<I>,
    /// Queue bridge producer used by the edge endpoints.
    pub producer: Arc<P>,
}

impl<R, E, I, P> Clone for AppState<R, E, I, P> {
    fn clone(&self) -> Self {
        Self {
            pipelines: Arc::clone(&self.pipelines),
            identity: Arc::clone(&self.identity),
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<R, E, I, P> AppState<R, E, I, P>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    pub fn new(pipelines: PipelineService<R, E>, identity: I, producer: P) -> Self {
        Self::from_arcs(Arc::new(pipelines), Arc::new(identity), Arc::new(producer))
    }

    /// Use this when the producer is shared with other tasks.
    pub fn from_arcs(
        pipelines: Arc<PipelineService<R, E>>,
        identity: Arc<I>,
        producer: Arc<P>,
    ) -> Self {
        Self {
            pipelines,
            identity,
            producer,
        }
    }
}
