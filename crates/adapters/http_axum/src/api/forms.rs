//! Edge producers: turn form activity into domain events on the broker.
//!
//! The authenticated caller becomes the event's subject, with the address
//! on file in the identity directory. Nothing here touches pipelines;
//! matching happens on the consumer side.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use formflow_app::ports::{EventProducer, EventRepository, IdentityLookup, PipelineRepository};
use formflow_domain::domain_event::{DomainEvent, Subject};
use formflow_domain::id::{FieldId, FormId, OccurrenceId};

use crate::auth::caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    #[serde(default)]
    pub answers: BTreeMap<FieldId, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChangeRequest {
    pub old_value: Option<String>,
    pub new_value: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedBody {
    #[serde(rename = "occurrenceID")]
    pub occurrence_id: OccurrenceId,
}

pub struct Accepted(OccurrenceId);

impl IntoResponse for Accepted {
    fn into_response(self) -> Response {
        (
            StatusCode::ACCEPTED,
            Json(AcceptedBody {
                occurrence_id: self.0,
            }),
        )
            .into_response()
    }
}

async fn resolve_subject<I: IdentityLookup>(
    identity: &I,
    headers: &HeaderMap,
) -> Result<Subject, ApiError> {
    let user_id = caller(identity, headers).await?;
    let email = identity.email_of(user_id.clone()).await?;
    Ok(Subject { user_id, email })
}

async fn publish<P: EventProducer>(producer: &P, event: DomainEvent) -> Result<Accepted, ApiError> {
    let occurrence_id = event.id;
    producer.publish(event).await?;
    tracing::info!(%occurrence_id, "domain event accepted");
    Ok(Accepted(occurrence_id))
}

/// `POST /api/forms/{form_id}/submissions`
pub async fn submit<R, E, I, P>(
    State(state): State<AppState<R, E, I, P>>,
    headers: HeaderMap,
    Path(form_id): Path<String>,
    Json(body): Json<SubmissionRequest>,
) -> Result<Accepted, ApiError>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    let subject = resolve_subject(state.identity.as_ref(), &headers).await?;
    let event = DomainEvent::form_submission(FormId::new(form_id), subject)
        .with_answers(body.answers);
    publish(state.producer.as_ref(), event).await
}

/// `POST /api/forms/{form_id}/fields/{field_id}/changes`
pub async fn change_field<R, E, I, P>(
    State(state): State<AppState<R, E, I, P>>,
    headers: HeaderMap,
    Path((form_id, field_id)): Path<(String, String)>,
    Json(body): Json<FieldChangeRequest>,
) -> Result<Accepted, ApiError>
where
    R: PipelineRepository + Send + Sync + 'static,
    E: EventRepository + Send + Sync + 'static,
    I: IdentityLookup + Send + Sync + 'static,
    P: EventProducer + Send + Sync + 'static,
{
    let subject = resolve_subject(state.identity.as_ref(), &headers).await?;
    let event = DomainEvent::field_change(
        FormId::new(form_id),
        FieldId::new(field_id),
        body.old_value,
        body.new_value,
        subject,
    );
    publish(state.producer.as_ref(), event).await
}
