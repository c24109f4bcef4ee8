//! Authorization guard: organizer-only access to pipelines.

use formflow_domain::error::{AuthorizationError, FormflowError, NotFoundError};
use formflow_domain::id::{EventId, UserId};

use crate::ports::EventRepository;

/// Decides whether an authenticated identity may mutate (or fully read) the
/// pipelines attached to a platform event.
///
/// The organizer set is read on every call; nothing is cached.
pub struct AuthorizationGuard<E> {
    events: E,
}

impl<E: EventRepository> AuthorizationGuard<E> {
    pub fn new(events: E) -> Self {
        Self { events }
    }

    /// `true` iff `user` is one of the event's organizers.
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::NotFound`] when the event does not exist, or a
    /// storage error from the repository.
    pub async fn can_mutate(&self, user: &UserId, event_id: &EventId) -> Result<bool, FormflowError> {
        let event = self
            .events
            .get_by_id(event_id.clone())
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "Event",
                id: event_id.to_string(),
            })?;
        Ok(event.is_organizer(user))
    }

    /// Like [`can_mutate`](Self::can_mutate) but turns a denial into an error.
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::Authorization`] when `user` is not an
    /// organizer, plus every error of [`can_mutate`](Self::can_mutate).
    #[tracing::instrument(skip_all, fields(user = %user, event = %event_id))]
    pub async fn authorize(&self, user: &UserId, event_id: &EventId) -> Result<(), FormflowError> {
        if self.can_mutate(user, event_id).await? {
            Ok(())
        } else {
            tracing::debug!("caller is not an organizer");
            Err(AuthorizationError {
                user: user.to_string(),
                event: event_id.to_string(),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::InMemoryEventRepo;
    use crate::ports::EventRepository as _;
    use formflow_domain::event::Event;
    use std::sync::Arc;

    fn guard_with(event: Event) -> (AuthorizationGuard<Arc<InMemoryEventRepo>>, Arc<InMemoryEventRepo>) {
        let repo = Arc::new(InMemoryEventRepo::with(vec![event]));
        (AuthorizationGuard::new(Arc::clone(&repo)), repo)
    }

    #[tokio::test]
    async fn should_allow_organizer() {
        let (guard, _) = guard_with(Event::new("E1", "conf").with_organizer("alice"));
        assert!(guard.can_mutate(&UserId::new("alice"), &EventId::new("E1")).await.unwrap());
    }

    #[tokio::test]
    async fn should_deny_non_organizer_with_authorization_error() {
        let (guard, _) = guard_with(Event::new("E1", "conf").with_organizer("alice"));
        let result = guard.authorize(&UserId::new("bob"), &EventId::new("E1")).await;
        assert!(matches!(result, Err(FormflowError::Authorization(_))));
    }

    #[tokio::test]
    async fn should_return_not_found_when_event_missing() {
        let (guard, _) = guard_with(Event::new("E1", "conf"));
        let result = guard.can_mutate(&UserId::new("alice"), &EventId::new("E2")).await;
        assert!(matches!(result, Err(FormflowError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_reflect_organizer_changes_between_calls() {
        let (guard, repo) = guard_with(Event::new("E1", "conf").with_organizer("alice"));
        let bob = UserId::new("bob");
        let event = EventId::new("E1");
        assert!(!guard.can_mutate(&bob, &event).await.unwrap());

        repo.upsert(Event::new("E1", "conf").with_organizer("bob"))
            .await
            .unwrap();

        assert!(guard.can_mutate(&bob, &event).await.unwrap());
        assert!(!guard.can_mutate(&UserId::new("alice"), &event).await.unwrap());
    }
}
