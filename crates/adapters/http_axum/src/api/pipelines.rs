//! JSON REST handlers for pipelines.
//!
//! Bodies are decoded through the type registry, so an unknown or malformed
//! `event`/`actions` entry comes back as 400 with the offending field named.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use formflow_app::ports::{EventProducer, EventRepository, IdentityLookup, PipelineRepository};
use formflow_domain::error::{FormflowError, NotFoundError};
use formflow_domain::id::{EventId, PipelineId};
use formflow_domain::pipeline::{PipelineConfiguration, PipelineDraft};

use crate::auth::caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedBody {
    pub id: PipelineId,
}

/// Possible responses from the pipeline endpoints.
pub enum PipelineResponse {
    Created(Json<CreatedBody>),
    Ok(Json<PipelineConfiguration>),
    List(Json<Vec<PipelineConfiguration>>),
    NoContent,
}

impl IntoResponse for PipelineResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::Ok(json) => json.into_response(),
            Self::List(json) => json.into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// An id that does not parse cannot name a stored pipeline.
fn parse_id(raw: &str) -> Result<PipelineId, ApiError> {
    PipelineId::from_str(raw).map_err(|_| {
        ApiError::from(FormflowError::from(NotFoundError {
            entity: "Pipeline",
            id: raw.to_string(),
        }))
    })
}

/// `POST /api/pipelines`: create a pipeline, returns `{"id": …}`.
pub async fn create<R, E, I, P>(
    State(state): State<AppState<R, E, I, P>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<PipelineResponse, ApiError>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    let user = caller(state.identity.as_ref(), &headers).await?;
    let draft = PipelineDraft::from_json(&body)?;
    let created = state.pipelines.create(&user, draft).await?;
    Ok(PipelineResponse::Created(Json(CreatedBody { id: created.id })))
}

/// `GET /api/pipelines/{id}`
pub async fn get<R, E, I, P>(
    State(state): State<AppState<R, E, I, P>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<PipelineResponse, ApiError>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    let user = caller(state.identity.as_ref(), &headers).await?;
    let id = parse_id(&id)?;
    let pipeline = state.pipelines.get(&user, id).await?;
    Ok(PipelineResponse::Ok(Json(pipeline)))
}

/// `PUT /api/pipelines/{id}`: replace event, actions and owning event.
pub async fn update<R, E, I, P>(
    State(state): State<AppState<R, E, I, P>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<PipelineResponse, ApiError>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    let user = caller(state.identity.as_ref(), &headers).await?;
    let id = parse_id(&id)?;
    let draft = PipelineDraft::from_json(&body)?;
    let updated = state.pipelines.update(&user, id, draft).await?;
    Ok(PipelineResponse::Ok(Json(updated)))
}

/// `DELETE /api/pipelines/{id}`
pub async fn delete<R, E, I, P>(
    State(state): State<AppState<R, E, I, P>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<PipelineResponse, ApiError>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    let user = caller(state.identity.as_ref(), &headers).await?;
    let id = parse_id(&id)?;
    state.pipelines.delete(&user, id).await?;
    Ok(PipelineResponse::NoContent)
}

/// `GET /api/events/{event_id}/pipelines`: every pipeline of one event.
pub async fn list_for_event<R, E, I, P>(
    State(state): State<AppState<R, E, I, P>>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> Result<PipelineResponse, ApiError>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    let user = caller(state.identity.as_ref(), &headers).await?;
    let pipelines = state
        .pipelines
        .list_for_event(&user, EventId::new(event_id))
        .await?;
    Ok(PipelineResponse::List(Json(pipelines)))
}
