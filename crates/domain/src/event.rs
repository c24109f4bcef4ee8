//! Event: a platform event (conference, meetup, …) that owns pipelines.
//!
//! Only the organizer set matters here: it decides who may create, read,
//! update, or delete the pipelines attached to the event.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{EventId, UserId};

/// A platform event and the identities allowed to manage it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "organizerIDs", default)]
    pub organizer_ids: BTreeSet<UserId>,
}

impl Event {
    #[must_use]
    pub fn new(id: impl Into<EventId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            organizer_ids: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_organizer(mut self, user: impl Into<UserId>) -> Self {
        self.organizer_ids.insert(user.into());
        self
    }

    /// Set membership test on the organizer set.
    #[must_use]
    pub fn is_organizer(&self, user: &UserId) -> bool {
        self.organizer_ids.contains(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_recognise_organizer_when_member_of_set() {
        let event = Event::new("E1", "RustConf").with_organizer("alice");
        assert!(event.is_organizer(&UserId::new("alice")));
        assert!(!event.is_organizer(&UserId::new("bob")));
    }

    #[test]
    fn should_deduplicate_organizers() {
        let event = Event::new("E1", "RustConf")
            .with_organizer("alice")
            .with_organizer("alice");
        assert_eq!(event.organizer_ids.len(), 1);
    }

    #[test]
    fn should_deserialize_organizer_ids() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "id": "E1",
            "organizerIDs": ["alice", "bob"]
        }))
        .unwrap();
        assert!(event.is_organizer(&UserId::new("bob")));
        assert!(event.name.is_empty());
    }
}
