//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use formflow_app::ports::{EventProducer, EventRepository, IdentityLookup, PipelineRepository};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// API routes live under `/api`. A [`TraceLayer`] logs each HTTP
/// request/response at the `DEBUG` level.
pub fn build<R, E, I, P>(state: AppState<R, E, I, P>) -> Router
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
