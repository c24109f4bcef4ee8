//! Domain events: runtime occurrences produced at the edges of the platform
//! (form submitted, field changed) and carried over the broker.
//!
//! Every instance has an [`OccurrenceId`]. Redelivered copies keep it, which
//! is what makes per-action execution idempotent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{FieldId, FormId, OccurrenceId, UserId};
use crate::pipeline::registry;
use crate::time::Timestamp;

/// The user a domain event is about (the submitter / owner of the answer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Subject {
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: Some(email.into()),
        }
    }

    /// A subject with no known email address.
    #[must_use]
    pub fn anonymous(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// Payload of a [`DomainEvent`], tagged with the same discriminators as
/// [`PipelineEvent`](crate::pipeline::PipelineEvent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEventKind {
    FormSubmission {
        #[serde(rename = "formID")]
        form_id: FormId,
        #[serde(default)]
        answers: BTreeMap<FieldId, String>,
    },
    FieldChange {
        #[serde(rename = "formID")]
        form_id: FormId,
        #[serde(rename = "fieldID")]
        field_id: FieldId,
        #[serde(rename = "oldValue", default)]
        old_value: Option<String>,
        #[serde(rename = "newValue")]
        new_value: String,
    },
}

impl DomainEventKind {
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::FormSubmission { .. } => registry::FORM_SUBMISSION,
            Self::FieldChange { .. } => registry::FIELD_CHANGE,
        }
    }

    #[must_use]
    pub fn form_id(&self) -> &FormId {
        match self {
            Self::FormSubmission { form_id, .. } | Self::FieldChange { form_id, .. } => form_id,
        }
    }
}

/// One concrete occurrence flowing through the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: OccurrenceId,
    pub subject: Subject,
    #[serde(rename = "occurredAt")]
    pub occurred_at: Timestamp,
    pub kind: DomainEventKind,
}

impl DomainEvent {
    /// Create a new occurrence with a fresh id, stamped with the current time.
    #[must_use]
    pub fn new(kind: DomainEventKind, subject: Subject) -> Self {
        Self {
            id: OccurrenceId::new(),
            subject,
            occurred_at: crate::time::now(),
            kind,
        }
    }

    /// A submission of `form_id` with no answers attached.
    #[must_use]
    pub fn form_submission(form_id: FormId, subject: Subject) -> Self {
        Self::new(
            DomainEventKind::FormSubmission {
                form_id,
                answers: BTreeMap::new(),
            },
            subject,
        )
    }

    #[must_use]
    pub fn field_change(
        form_id: FormId,
        field_id: FieldId,
        old_value: Option<String>,
        new_value: impl Into<String>,
        subject: Subject,
    ) -> Self {
        Self::new(
            DomainEventKind::FieldChange {
                form_id,
                field_id,
                old_value,
                new_value: new_value.into(),
            },
            subject,
        )
    }

    /// Attach answers to a form submission. No-op for other kinds.
    #[must_use]
    pub fn with_answers(mut self, answers: impl IntoIterator<Item = (FieldId, String)>) -> Self {
        if let DomainEventKind::FormSubmission { answers: existing, .. } = &mut self.kind {
            existing.extend(answers);
        }
        self
    }

    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        self.kind.discriminator()
    }

    /// Flat key/value view used to render email templates and webhook bodies.
    ///
    /// Keys: `formID`, `subjectID`, `subjectEmail` (when known), `fieldID`
    /// and `value` for field changes, and one entry per submitted answer.
    #[must_use]
    pub fn template_context(&self) -> BTreeMap<String, String> {
        let mut ctx = BTreeMap::new();
        ctx.insert("formID".to_string(), self.kind.form_id().to_string());
        ctx.insert("subjectID".to_string(), self.subject.user_id.to_string());
        if let Some(email) = &self.subject.email {
            ctx.insert("subjectEmail".to_string(), email.clone());
        }
        match &self.kind {
            DomainEventKind::FormSubmission { answers, .. } => {
                for (field, value) in answers {
                    ctx.insert(field.to_string(), value.clone());
                }
            }
            DomainEventKind::FieldChange {
                field_id, new_value, ..
            } => {
                ctx.insert("fieldID".to_string(), field_id.to_string());
                ctx.insert("value".to_string(), new_value.clone());
            }
        }
        ctx
    }
}
