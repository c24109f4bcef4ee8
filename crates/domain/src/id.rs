//! Typed identifier newtypes.
//!
//! Records owned by this system ([`PipelineId`], [`EmailTemplateId`],
//! [`OccurrenceId`]) are keyed by UUIDs. Identifiers that come from the rest
//! of the platform (users, events, forms, fields) are opaque strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

macro_rules! define_key {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw key.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw key.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// `true` when the key is empty or whitespace only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`PipelineConfiguration`](crate::pipeline::PipelineConfiguration).
    PipelineId
);

define_id!(
    /// Unique identifier for an [`EmailTemplate`](crate::email::EmailTemplate).
    EmailTemplateId
);

define_id!(
    /// Unique identifier of one triggering [`DomainEvent`](crate::domain_event::DomainEvent) instance.
    ///
    /// Redelivered copies of the same occurrence share this id.
    OccurrenceId
);

define_key!(
    /// Identity of an authenticated platform user.
    UserId
);

define_key!(
    /// Identifier of a platform [`Event`](crate::event::Event).
    EventId
);

define_key!(
    /// Identifier of a form.
    FormId
);

define_key!(
    /// Identifier of a field within a form.
    FieldId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = PipelineId::new();
        let b = PipelineId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = OccurrenceId::new();
        let parsed: OccurrenceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        assert!(PipelineId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn should_serialize_string_keys_transparently() {
        let form = FormId::new("F1");
        assert_eq!(serde_json::to_string(&form).unwrap(), "\"F1\"");
        let parsed: FormId = serde_json::from_str("\"F1\"").unwrap();
        assert_eq!(parsed, form);
    }

    #[test]
    fn should_detect_blank_keys() {
        assert!(EventId::new("  ").is_blank());
        assert!(!EventId::new("evt").is_blank());
    }
}
