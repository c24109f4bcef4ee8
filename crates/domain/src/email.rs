//! Email templates and `{{placeholder}}` rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{EmailTemplateId, EventId};

/// A reusable email owned by a platform event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub id: EmailTemplateId,
    #[serde(rename = "eventID")]
    pub event_id: EventId,
    pub name: String,
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(rename = "isHTML", default)]
    pub is_html: bool,
}

/// A template with every placeholder substituted, ready to hand to a mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub from: String,
    pub to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

impl EmailTemplate {
    /// Render subject and body for recipient `to`.
    #[must_use]
    pub fn render(&self, to: impl Into<String>, ctx: &BTreeMap<String, String>) -> RenderedEmail {
        RenderedEmail {
            from: self.from.clone(),
            to: to.into(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            reply_to: self.reply_to.clone(),
            subject: render(&self.subject, ctx),
            body: render(&self.body, ctx),
            is_html: self.is_html,
        }
    }
}

/// Substitute `{{key}}` occurrences with values from `ctx`.
///
/// Whitespace inside the braces is ignored. Unknown keys render as the empty
/// string; an unterminated `{{` is copied verbatim.
#[must_use]
pub fn render(template: &str, ctx: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        if let Some(value) = ctx.get(after[..end].trim()) {
            out.push_str(value);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("name".to_string(), "Ada".to_string()),
            ("formID".to_string(), "F1".to_string()),
        ])
    }

    #[test]
    fn should_substitute_known_placeholders() {
        assert_eq!(render("Hi {{name}}, thanks for {{ formID }}!", &ctx()), "Hi Ada, thanks for F1!");
    }

    #[test]
    fn should_render_unknown_placeholder_as_empty() {
        assert_eq!(render("Hi {{nickname}}.", &ctx()), "Hi .");
    }

    #[test]
    fn should_copy_unterminated_placeholder_verbatim() {
        assert_eq!(render("Hi {{name", &ctx()), "Hi {{name");
    }

    #[test]
    fn should_render_template_for_recipient() {
        let template = EmailTemplate {
            id: EmailTemplateId::new(),
            event_id: EventId::new("E1"),
            name: "welcome".to_string(),
            from: "team@example.com".to_string(),
            subject: "Welcome {{name}}".to_string(),
            body: "Form {{formID}}".to_string(),
            cc: vec![],
            bcc: vec![],
            reply_to: None,
            is_html: false,
        };
        let email = template.render("ada@example.com", &ctx());
        assert_eq!(email.to, "ada@example.com");
        assert_eq!(email.subject, "Welcome Ada");
        assert_eq!(email.body, "Form F1");
    }
}
