//! Pipeline events: the domain occurrence a pipeline reacts to.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain_event::{DomainEvent, DomainEventKind};
use crate::id::{FieldId, FormId};

use super::registry;

/// Describes which domain event activates a pipeline.
///
/// Decoding goes through the [`registry`], so an unknown `type` is a
/// [`SchemaError`](crate::error::SchemaError) rather than a silent fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Fires when a specific form is submitted.
    FormSubmission(FormSubmission),
    /// Fires when a field's new value satisfies a condition.
    FieldChange(FieldChange),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSubmission {
    #[serde(rename = "onFormID")]
    pub on_form_id: FormId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    #[serde(rename = "onFormID")]
    pub on_form_id: FormId,
    #[serde(rename = "onFieldID")]
    pub on_field_id: FieldId,
    pub condition: FieldChangeCondition,
}

/// String comparison applied to a field's new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChangeCondition {
    pub comparison: Comparison,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Eq,
    Neq,
}

impl FieldChangeCondition {
    /// Exact, byte-wise comparison. No trimming, no case folding, no substrings.
    #[must_use]
    pub fn evaluate(&self, new_value: &str) -> bool {
        match self.comparison {
            Comparison::Eq => new_value == self.value,
            Comparison::Neq => new_value != self.value,
        }
    }
}

impl PipelineEvent {
    /// Discriminator string shared with [`DomainEventKind::discriminator`].
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::FormSubmission(_) => registry::FORM_SUBMISSION,
            Self::FieldChange(_) => registry::FIELD_CHANGE,
        }
    }

    /// The form this pipeline listens on.
    #[must_use]
    pub fn form_id(&self) -> &FormId {
        match self {
            Self::FormSubmission(e) => &e.on_form_id,
            Self::FieldChange(e) => &e.on_form_id,
        }
    }

    /// Check whether this pipeline event matches a concrete domain event.
    #[must_use]
    pub fn matches(&self, event: &DomainEvent) -> bool {
        match (self, &event.kind) {
            (Self::FormSubmission(rule), DomainEventKind::FormSubmission { form_id, .. }) => {
                rule.on_form_id == *form_id
            }
            (
                Self::FieldChange(rule),
                DomainEventKind::FieldChange {
                    form_id,
                    field_id,
                    new_value,
                    ..
                },
            ) => {
                rule.on_form_id == *form_id
                    && rule.on_field_id == *field_id
                    && rule.condition.evaluate(new_value)
            }
            _ => false,
        }
    }
}

impl<'de> Deserialize<'de> for PipelineEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        registry::decode_event(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FormSubmission(e) => write!(f, "form_submission({})", e.on_form_id),
            Self::FieldChange(e) => write!(f, "field_change({}.{})", e.on_form_id, e.on_field_id),
        }
    }
}
