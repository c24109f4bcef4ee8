//! Pipeline actions: the side effects executed when a pipeline matches.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ActionExecutionError;
use crate::id::{EmailTemplateId, FormId};
use crate::time::{Timestamp, try_hours};

use super::registry;

/// An operation executed, in order, for every matched pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum PipelineAction {
    /// Render an email template and send it to the event's subject.
    SendEmail(SendEmail),
    /// Grant timed access to a follow-up form.
    AllowFormAccess(AllowFormAccess),
    /// Call an external HTTP endpoint.
    Webhook(Webhook),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmail {
    #[serde(rename = "emailTemplateID")]
    pub email_template_id: EmailTemplateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowFormAccess {
    #[serde(rename = "toFormID")]
    pub to_form_id: FormId,
    pub options: FormAccessOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormAccessOptions {
    pub expiration: ExpirationOptions,
}

/// Upper bound for `inHoursFromPipelineRun`: ten years.
pub const MAX_EXPIRATION_HOURS: i64 = 24 * 365 * 10;

/// When a granted access expires, relative to the pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationOptions {
    pub in_hours_from_pipeline_run: i64,
    pub reminder: ReminderOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReminderOptions {
    pub remind: bool,
    pub in_hours_before_expiration: i64,
}

impl ExpirationOptions {
    /// Absolute expiry for a pipeline run started at `run_at`.
    ///
    /// # Errors
    ///
    /// [`ActionExecutionError::OutOfRange`] when the offset overflows.
    pub fn expires_at(&self, run_at: Timestamp) -> Result<Timestamp, ActionExecutionError> {
        try_hours(self.in_hours_from_pipeline_run)
            .and_then(|offset| run_at.checked_add_signed(offset))
            .ok_or_else(|| {
                ActionExecutionError::OutOfRange(format!(
                    "expiry {}h after {run_at}",
                    self.in_hours_from_pipeline_run
                ))
            })
    }

    /// Reminder time for an access expiring at `expires_at`, or `None` when
    /// no reminder is configured.
    ///
    /// # Errors
    ///
    /// [`ActionExecutionError::OutOfRange`] when the offset overflows.
    pub fn reminder_at(
        &self,
        expires_at: Timestamp,
    ) -> Result<Option<Timestamp>, ActionExecutionError> {
        if !self.reminder.remind {
            return Ok(None);
        }
        let before = self.reminder.in_hours_before_expiration;
        try_hours(before)
            .and_then(|offset| expires_at.checked_sub_signed(offset))
            .map(Some)
            .ok_or_else(|| {
                ActionExecutionError::OutOfRange(format!("reminder {before}h before {expires_at}"))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: BTreeMap<String, String>,
}

/// HTTP verbs a webhook may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl PipelineAction {
    /// Discriminator string, equal to the variant name.
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::SendEmail(_) => registry::SEND_EMAIL,
            Self::AllowFormAccess(_) => registry::ALLOW_FORM_ACCESS,
            Self::Webhook(_) => registry::WEBHOOK,
        }
    }
}

impl<'de> Deserialize<'de> for PipelineAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        registry::decode_action(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for PipelineAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SendEmail(a) => write!(f, "send_email({})", a.email_template_id),
            Self::AllowFormAccess(a) => write!(
                f,
                "allow_form_access({}, {}h)",
                a.to_form_id, a.options.expiration.in_hours_from_pipeline_run
            ),
            Self::Webhook(a) => write!(f, "webhook({} {})", a.method.as_str(), a.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expiration(hours: i64, remind: bool, before: i64) -> ExpirationOptions {
        ExpirationOptions {
            in_hours_from_pipeline_run: hours,
            reminder: ReminderOptions {
                remind,
                in_hours_before_expiration: before,
            },
        }
    }

    #[test]
    fn should_compute_expiry_and_reminder_relative_to_run() {
        let run = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let opts = expiration(24, true, 2);
        let expires_at = opts.expires_at(run).unwrap();
        assert_eq!(expires_at, run + chrono::Duration::hours(24));
        assert_eq!(
            opts.reminder_at(expires_at),
            Ok(Some(run + chrono::Duration::hours(22)))
        );
    }

    #[test]
    fn should_skip_reminder_when_disabled() {
        let opts = expiration(24, false, 2);
        let expires_at = opts.expires_at(crate::time::now()).unwrap();
        assert_eq!(opts.reminder_at(expires_at), Ok(None));
    }

    #[test]
    fn should_report_out_of_range_offsets_instead_of_overflowing() {
        let run = crate::time::now();
        assert!(matches!(
            expiration(10_000_000_000, false, 0).expires_at(run),
            Err(ActionExecutionError::OutOfRange(_))
        ));
        assert!(matches!(
            expiration(i64::MAX, false, 0).expires_at(run),
            Err(ActionExecutionError::OutOfRange(_))
        ));
        assert!(matches!(
            expiration(24, true, i64::MAX).reminder_at(run),
            Err(ActionExecutionError::OutOfRange(_))
        ));
    }

    #[test]
    fn should_deserialize_allow_form_access_from_tagged_json() {
        let json = serde_json::json!({
            "type": "AllowFormAccess",
            "toFormID": "F2",
            "options": {"expiration": {
                "inHoursFromPipelineRun": 24,
                "reminder": {"remind": true, "inHoursBeforeExpiration": 2}
            }}
        });
        let action: PipelineAction = serde_json::from_value(json).unwrap();
        let PipelineAction::AllowFormAccess(access) = action else {
            panic!("expected AllowFormAccess");
        };
        assert_eq!(access.to_form_id, FormId::new("F2"));
        assert_eq!(access.options.expiration, expiration(24, true, 2));
    }

    #[test]
    fn should_default_webhook_headers_and_body() {
        let json = serde_json::json!({
            "type": "Webhook",
            "url": "https://example.com/hook",
            "method": "POST"
        });
        let action: PipelineAction = serde_json::from_value(json).unwrap();
        assert!(matches!(
            action,
            PipelineAction::Webhook(Webhook { ref headers, ref body, method: HttpMethod::Post, .. })
                if headers.is_empty() && body.is_empty()
        ));
    }

    #[test]
    fn should_reject_unsupported_http_method() {
        let json = serde_json::json!({
            "type": "Webhook",
            "url": "https://example.com/hook",
            "method": "PATCH"
        });
        assert!(serde_json::from_value::<PipelineAction>(json).is_err());
    }

    #[test]
    fn should_display_actions() {
        let hook = PipelineAction::Webhook(Webhook {
            url: "https://example.com".to_string(),
            method: HttpMethod::Delete,
            headers: BTreeMap::new(),
            body: BTreeMap::new(),
        });
        assert_eq!(hook.to_string(), "webhook(DELETE https://example.com)");
    }
}
