//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`FormflowError`] via `#[from]`. Adapters box their IO failures into
//! [`FormflowError::Storage`].

use std::fmt;

/// Root error type shared by every crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum FormflowError {
    /// A pipeline payload is malformed or carries an unknown variant.
    #[error("schema error")]
    Schema(#[from] SchemaError),

    /// A referenced pipeline, event, template, … does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The caller is authenticated but not allowed to perform the operation.
    #[error("not authorized")]
    Authorization(#[from] AuthorizationError),

    /// No caller identity could be established.
    #[error("not authenticated")]
    Unauthenticated,

    /// The broker rejected or could not accept a published domain event.
    #[error("publish failed")]
    Publish(#[from] PublishError),

    /// A single action's external call failed.
    #[error("action execution failed")]
    ActionExecution(#[from] ActionExecutionError),

    /// Persistence or transport failure raised by an adapter.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path to the offending field, e.g. `actions[1].url`.
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

impl FieldError {
    #[must_use]
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Failures raised while decoding or validating pipeline payloads.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The payload is not an object carrying a `type` discriminator.
    #[error("{family} is missing the `type` discriminator")]
    MissingDiscriminator { family: &'static str },

    /// The discriminator does not name a known variant.
    #[error("unknown {family} type `{found}`")]
    UnknownDiscriminator { family: &'static str, found: String },

    /// A known variant is missing one of its required fields.
    #[error("{variant} is missing required field `{field}`")]
    MissingField {
        variant: &'static str,
        field: &'static str,
    },

    /// The payload has the right shape but a field could not be decoded.
    #[error("{variant} is malformed: {reason}")]
    Malformed {
        variant: &'static str,
        reason: String,
    },

    /// Cross-field rules failed; every offending field is listed.
    #[error("invalid pipeline: {}", join_fields(.0))]
    Invalid(Vec<FieldError>),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A referenced record does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The caller is not an organizer of the event that owns the resource.
#[derive(Debug, thiserror::Error)]
#[error("user `{user}` is not an organizer of event `{event}`")]
pub struct AuthorizationError {
    pub user: String,
    pub event: String,
}

/// The broker could not accept a domain event.
#[derive(Debug, thiserror::Error)]
#[error("failed to publish `{event_type}` event")]
pub struct PublishError {
    pub event_type: &'static str,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// A single action's side effect failed.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ActionExecutionError {
    /// The collaborator answered but refused (e.g. non-2xx webhook response).
    #[error("rejected with status {status}")]
    Rejected { status: u16 },

    /// The collaborator could not be reached or did not answer in time.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Something the action depends on is missing (template, subject email, …).
    #[error("missing dependency: {0}")]
    Missing(String),

    /// A configured offset lands outside the representable time range.
    #[error("out of range: {0}")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_list_every_field_when_displaying_invalid_schema() {
        let err = SchemaError::Invalid(vec![
            FieldError::new("actions", "must not be empty"),
            FieldError::new("eventID", "is required"),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid pipeline: actions: must not be empty; eventID: is required"
        );
    }

    #[test]
    fn should_name_offending_field_when_required_field_missing() {
        let err = SchemaError::MissingField {
            variant: "FieldChange",
            field: "onFieldID",
        };
        assert_eq!(
            err.to_string(),
            "FieldChange is missing required field `onFieldID`"
        );
    }

    #[test]
    fn should_convert_schema_error_into_root_error() {
        let err: FormflowError = SchemaError::MissingDiscriminator { family: "event" }.into();
        assert!(matches!(err, FormflowError::Schema(_)));
    }
}
