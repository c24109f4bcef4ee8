//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod forms;
#[allow(clippy::missing_errors_doc)]
pub mod pipelines;

use axum::Router;
use axum::routing::{get, post};

use formflow_app::ports::{EventProducer, EventRepository, IdentityLookup, PipelineRepository};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<R, E, I, P>() -> Router<AppState<R, E, I, P>>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    Router::new()
        // Pipelines
        .route("/pipelines", post(pipelines::create::<R, E, I, P>))
        .route(
            "/pipelines/{id}",
            get(pipelines::get::<R, E, I, P>)
                .put(pipelines::update::<R, E, I, P>)
                .delete(pipelines::delete::<R, E, I, P>),
        )
        .route(
            "/events/{event_id}/pipelines",
            get(pipelines::list_for_event::<R, E, I, P>),
        )
        // Edge producers
        .route(
            "/forms/{form_id}/submissions",
            post(forms::submit::<R, E, I, P>),
        )
        .route(
            "/forms/{form_id}/fields/{field_id}/changes",
            post(forms::change_field::<R, E, I, P>),
        )
}
