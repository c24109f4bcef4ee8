//! Type registry: the closed mapping from discriminator to variant decoder.
//!
//! Every pipeline event and action variant is listed here exactly once,
//! together with the fields it cannot be decoded without. Adding a variant
//! means adding one table entry and one arm in the matcher and dispatcher.

use serde_json::Value;

use crate::error::{FieldError, SchemaError};

use super::PipelineConfiguration;
use super::action::{
    AllowFormAccess, MAX_EXPIRATION_HOURS, PipelineAction, SendEmail, Webhook,
};
use super::trigger::{FieldChange, FormSubmission, PipelineEvent};

pub const FORM_SUBMISSION: &str = "FormSubmission";
pub const FIELD_CHANGE: &str = "FieldChange";

pub const SEND_EMAIL: &str = "SendEmail";
pub const ALLOW_FORM_ACCESS: &str = "AllowFormAccess";
pub const WEBHOOK: &str = "Webhook";

const DISCRIMINATOR: &str = "type";

struct VariantDecoder<T> {
    tag: &'static str,
    required: &'static [&'static str],
    decode: fn(Value) -> Result<T, serde_json::Error>,
}

const EVENT_VARIANTS: &[VariantDecoder<PipelineEvent>] = &[
    VariantDecoder {
        tag: FORM_SUBMISSION,
        required: &["onFormID"],
        decode: decode_form_submission,
    },
    VariantDecoder {
        tag: FIELD_CHANGE,
        required: &["onFormID", "onFieldID", "condition"],
        decode: decode_field_change,
    },
];

const ACTION_VARIANTS: &[VariantDecoder<PipelineAction>] = &[
    VariantDecoder {
        tag: SEND_EMAIL,
        required: &["emailTemplateID"],
        decode: decode_send_email,
    },
    VariantDecoder {
        tag: ALLOW_FORM_ACCESS,
        required: &["toFormID", "options"],
        decode: decode_allow_form_access,
    },
    VariantDecoder {
        tag: WEBHOOK,
        required: &["url", "method"],
        decode: decode_webhook,
    },
];

fn decode_form_submission(raw: Value) -> Result<PipelineEvent, serde_json::Error> {
    serde_json::from_value::<FormSubmission>(raw).map(PipelineEvent::FormSubmission)
}

fn decode_field_change(raw: Value) -> Result<PipelineEvent, serde_json::Error> {
    serde_json::from_value::<FieldChange>(raw).map(PipelineEvent::FieldChange)
}

fn decode_send_email(raw: Value) -> Result<PipelineAction, serde_json::Error> {
    serde_json::from_value::<SendEmail>(raw).map(PipelineAction::SendEmail)
}

fn decode_allow_form_access(raw: Value) -> Result<PipelineAction, serde_json::Error> {
    serde_json::from_value::<AllowFormAccess>(raw).map(PipelineAction::AllowFormAccess)
}

fn decode_webhook(raw: Value) -> Result<PipelineAction, serde_json::Error> {
    serde_json::from_value::<Webhook>(raw).map(PipelineAction::Webhook)
}

fn decode<T>(
    family: &'static str,
    table: &[VariantDecoder<T>],
    raw: &Value,
) -> Result<T, SchemaError> {
    let object = raw
        .as_object()
        .ok_or(SchemaError::MissingDiscriminator { family })?;
    let tag = object
        .get(DISCRIMINATOR)
        .and_then(Value::as_str)
        .ok_or(SchemaError::MissingDiscriminator { family })?;
    let variant = table
        .iter()
        .find(|variant| variant.tag == tag)
        .ok_or_else(|| SchemaError::UnknownDiscriminator {
            family,
            found: tag.to_string(),
        })?;
    if let Some(field) = variant
        .required
        .iter()
        .find(|field| object.get(**field).is_none_or(Value::is_null))
    {
        return Err(SchemaError::MissingField {
            variant: variant.tag,
            field: *field,
        });
    }
    (variant.decode)(raw.clone()).map_err(|err| SchemaError::Malformed {
        variant: variant.tag,
        reason: err.to_string(),
    })
}

/// Decode a raw JSON value into a [`PipelineEvent`].
///
/// # Errors
///
/// Returns [`SchemaError`] when the discriminator is missing or unknown, a
/// required field is absent, or a field has the wrong shape.
pub fn decode_event(raw: &Value) -> Result<PipelineEvent, SchemaError> {
    decode("event", EVENT_VARIANTS, raw)
}

/// Decode a raw JSON value into a [`PipelineAction`].
///
/// # Errors
///
/// Same conditions as [`decode_event`].
pub fn decode_action(raw: &Value) -> Result<PipelineAction, SchemaError> {
    decode("action", ACTION_VARIANTS, raw)
}

/// All registered event discriminators, in registration order.
pub fn event_types() -> impl Iterator<Item = &'static str> {
    EVENT_VARIANTS.iter().map(|variant| variant.tag)
}

/// All registered action discriminators, in registration order.
pub fn action_types() -> impl Iterator<Item = &'static str> {
    ACTION_VARIANTS.iter().map(|variant| variant.tag)
}

/// Check every cross-field rule of a pipeline and collect all failures.
///
/// # Errors
///
/// Returns [`SchemaError::Invalid`] listing each offending field.
pub fn validate(pipeline: &PipelineConfiguration) -> Result<(), SchemaError> {
    let mut errors = Vec::new();

    if pipeline.event_id.is_blank() {
        errors.push(FieldError::new("eventID", "is required"));
    }

    validate_event(&pipeline.event, &mut errors);

    if pipeline.actions.is_empty() {
        errors.push(FieldError::new("actions", "must contain at least one action"));
    }
    for (index, action) in pipeline.actions.iter().enumerate() {
        validate_action(index, action, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Invalid(errors))
    }
}

fn validate_event(event: &PipelineEvent, errors: &mut Vec<FieldError>) {
    match event {
        PipelineEvent::FormSubmission(rule) => {
            if rule.on_form_id.is_blank() {
                errors.push(FieldError::new("event.onFormID", "is required"));
            }
        }
        PipelineEvent::FieldChange(rule) => {
            if rule.on_form_id.is_blank() {
                errors.push(FieldError::new("event.onFormID", "is required"));
            }
            if rule.on_field_id.is_blank() {
                errors.push(FieldError::new("event.onFieldID", "is required"));
            }
            if rule.condition.value.is_empty() {
                errors.push(FieldError::new("event.condition.value", "is required"));
            }
        }
    }
}

fn validate_action(index: usize, action: &PipelineAction, errors: &mut Vec<FieldError>) {
    let path = |field: &str| format!("actions[{index}].{field}");
    match action {
        PipelineAction::SendEmail(_) => {}
        PipelineAction::AllowFormAccess(access) => {
            if access.to_form_id.is_blank() {
                errors.push(FieldError::new(path("toFormID"), "is required"));
            }
            let expiration = &access.options.expiration;
            if expiration.in_hours_from_pipeline_run <= 0 {
                errors.push(FieldError::new(
                    path("options.expiration.inHoursFromPipelineRun"),
                    "must be greater than 0",
                ));
            } else if expiration.in_hours_from_pipeline_run > MAX_EXPIRATION_HOURS {
                errors.push(FieldError::new(
                    path("options.expiration.inHoursFromPipelineRun"),
                    format!("must be at most {MAX_EXPIRATION_HOURS}"),
                ));
            }
            let before = expiration.reminder.in_hours_before_expiration;
            if before < 0 {
                errors.push(FieldError::new(
                    path("options.expiration.reminder.inHoursBeforeExpiration"),
                    "must be greater than or equal to 0",
                ));
            } else if expiration.reminder.remind && before >= expiration.in_hours_from_pipeline_run
            {
                errors.push(FieldError::new(
                    path("options.expiration.reminder.inHoursBeforeExpiration"),
                    "must be less than inHoursFromPipelineRun",
                ));
            }
        }
        PipelineAction::Webhook(hook) => match url::Url::parse(&hook.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
            Ok(_) => errors.push(FieldError::new(path("url"), "must be an http(s) URL")),
            Err(err) => errors.push(FieldError::new(path("url"), err.to_string())),
        },
    }
}
