//! Pipeline: a stored rule binding one trigger event to an ordered list of actions.
//!
//! A [`PipelineConfiguration`] belongs to a platform event (`eventID`) and is
//! only mutated by that event's organizers. The matching and execution path
//! never writes to it.

mod action;
pub mod registry;
mod trigger;

pub use action::{
    AllowFormAccess, ExpirationOptions, FormAccessOptions, HttpMethod, MAX_EXPIRATION_HOURS,
    PipelineAction, ReminderOptions, SendEmail, Webhook,
};
pub use trigger::{Comparison, FieldChange, FieldChangeCondition, FormSubmission, PipelineEvent};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldError, FormflowError, SchemaError};
use crate::id::{EventId, PipelineId};
use crate::time::Timestamp;

/// Aggregate root: one trigger-action rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    pub id: PipelineId,
    pub event: PipelineEvent,
    pub actions: Vec<PipelineAction>,
    #[serde(rename = "eventID")]
    pub event_id: EventId,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

impl PipelineConfiguration {
    /// Create a builder for constructing a [`PipelineConfiguration`].
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Check every domain invariant through the [`registry`].
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::Schema`] with [`SchemaError::Invalid`]
    /// listing each offending field.
    pub fn validate(&self) -> Result<(), FormflowError> {
        registry::validate(self)?;
        Ok(())
    }
}

/// The client-supplied part of a pipeline: everything except `id` and
/// `updatedAt`, which the store assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDraft {
    pub event: PipelineEvent,
    pub actions: Vec<PipelineAction>,
    #[serde(rename = "eventID")]
    pub event_id: EventId,
}

impl PipelineDraft {
    /// Decode a raw request body, routing `event` and every action through
    /// the [`registry`] so failures keep their typed [`SchemaError`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the body is not an object, a top-level
    /// field is missing, or any variant fails to decode.
    pub fn from_json(raw: &Value) -> Result<Self, SchemaError> {
        const VARIANT: &str = "PipelineConfiguration";
        let object = raw.as_object().ok_or_else(|| SchemaError::Malformed {
            variant: VARIANT,
            reason: "expected a JSON object".to_string(),
        })?;
        let field = move |name: &'static str| {
            object
                .get(name)
                .filter(|value| !value.is_null())
                .ok_or(SchemaError::MissingField {
                    variant: VARIANT,
                    field: name,
                })
        };

        let event = registry::decode_event(field("event")?)?;
        let actions = field("actions")?
            .as_array()
            .ok_or_else(|| SchemaError::Malformed {
                variant: VARIANT,
                reason: "`actions` must be an array".to_string(),
            })?
            .iter()
            .map(registry::decode_action)
            .collect::<Result<Vec<_>, _>>()?;
        let event_id = field("eventID")?
            .as_str()
            .ok_or_else(|| SchemaError::Malformed {
                variant: VARIANT,
                reason: "`eventID` must be a string".to_string(),
            })?;

        Ok(Self {
            event,
            actions,
            event_id: EventId::new(event_id),
        })
    }

    /// Attach store-assigned fields.
    #[must_use]
    pub fn into_pipeline(self, id: PipelineId, updated_at: Timestamp) -> PipelineConfiguration {
        PipelineConfiguration {
            id,
            event: self.event,
            actions: self.actions,
            event_id: self.event_id,
            updated_at,
        }
    }
}

/// Step-by-step builder for [`PipelineConfiguration`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    id: Option<PipelineId>,
    event: Option<PipelineEvent>,
    actions: Vec<PipelineAction>,
    event_id: Option<EventId>,
    updated_at: Option<Timestamp>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn id(mut self, id: PipelineId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn event(mut self, event: PipelineEvent) -> Self {
        self.event = Some(event);
        self
    }

    #[must_use]
    pub fn action(mut self, action: PipelineAction) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = PipelineAction>) -> Self {
        self.actions.extend(actions);
        self
    }

    #[must_use]
    pub fn event_id(mut self, event_id: impl Into<EventId>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    #[must_use]
    pub fn updated_at(mut self, ts: Timestamp) -> Self {
        self.updated_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`PipelineConfiguration`].
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::Schema`] if the trigger event is missing or
    /// any invariant fails.
    pub fn build(self) -> Result<PipelineConfiguration, FormflowError> {
        let Some(event) = self.event else {
            return Err(SchemaError::Invalid(vec![FieldError::new("event", "is required")]).into());
        };
        let pipeline = PipelineConfiguration {
            id: self.id.unwrap_or_default(),
            event,
            actions: self.actions,
            event_id: self.event_id.unwrap_or_else(|| EventId::new("")),
            updated_at: self.updated_at.unwrap_or_else(crate::time::now),
        };
        pipeline.validate()?;
        Ok(pipeline)
    }
}
