//! Directory ports: read-mostly lookups owned by the rest of the platform:
//! platform events, caller identities and email templates.

use std::future::Future;

use formflow_domain::email::EmailTemplate;
use formflow_domain::error::FormflowError;
use formflow_domain::event::Event;
use formflow_domain::id::{EmailTemplateId, EventId, UserId};

/// Platform events and their organizer sets.
pub trait EventRepository {
    fn get_by_id(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, FormflowError>> + Send;

    /// Insert or replace an event (used for seeding).
    fn upsert(&self, event: Event) -> impl Future<Output = Result<Event, FormflowError>> + Send;
}

/// Resolves a bearer token into the identity it was issued to.
pub trait IdentityLookup {
    /// `None` when the token is unknown.
    fn authenticate(
        &self,
        token: String,
    ) -> impl Future<Output = Result<Option<UserId>, FormflowError>> + Send;

    /// Address on file for `user`, if any.
    fn email_of(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<String>, FormflowError>> + Send;
}

pub trait EmailTemplateRepository {
    fn get_by_id(
        &self,
        id: EmailTemplateId,
    ) -> impl Future<Output = Result<Option<EmailTemplate>, FormflowError>> + Send;

    fn upsert(
        &self,
        template: EmailTemplate,
    ) -> impl Future<Output = Result<EmailTemplate, FormflowError>> + Send;
}

impl<T: EventRepository + Send + Sync> EventRepository for std::sync::Arc<T> {
    fn get_by_id(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, FormflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn upsert(&self, event: Event) -> impl Future<Output = Result<Event, FormflowError>> + Send {
        (**self).upsert(event)
    }
}

impl<T: IdentityLookup + Send + Sync> IdentityLookup for std::sync::Arc<T> {
    fn authenticate(
        &self,
        token: String,
    ) -> impl Future<Output = Result<Option<UserId>, FormflowError>> + Send {
        (**self).authenticate(token)
    }

    fn email_of(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<String>, FormflowError>> + Send {
        (**self).email_of(user)
    }
}

impl<T: EmailTemplateRepository + Send + Sync> EmailTemplateRepository for std::sync::Arc<T> {
    fn get_by_id(
        &self,
        id: EmailTemplateId,
    ) -> impl Future<Output = Result<Option<EmailTemplate>, FormflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn upsert(
        &self,
        template: EmailTemplate,
    ) -> impl Future<Output = Result<EmailTemplate, FormflowError>> + Send {
        (**self).upsert(template)
    }
}
