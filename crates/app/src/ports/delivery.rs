//! Delivery ports: outbound side effects executed by actions.
//!
//! Failures here are per-action [`ActionExecutionError`]s, never storage
//! errors: a failed email or webhook must not abort its sibling actions.

use std::collections::BTreeMap;
use std::future::Future;

use formflow_domain::email::RenderedEmail;
use formflow_domain::error::ActionExecutionError;
use formflow_domain::pipeline::HttpMethod;

/// Hands rendered emails to a mail transport.
pub trait EmailSender {
    fn send(
        &self,
        email: RenderedEmail,
    ) -> impl Future<Output = Result<(), ActionExecutionError>> + Send;
}

/// A fully rendered outbound webhook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Sent as a JSON object when non-empty.
    pub body: BTreeMap<String, String>,
}

/// Issues webhook calls, bounded by a request timeout.
pub trait WebhookClient {
    /// Returns the response status, whatever it is. Transport failures and
    /// timeouts are [`ActionExecutionError::Delivery`].
    fn call(
        &self,
        request: WebhookRequest,
    ) -> impl Future<Output = Result<u16, ActionExecutionError>> + Send;
}

impl<T: EmailSender + Send + Sync> EmailSender for std::sync::Arc<T> {
    fn send(
        &self,
        email: RenderedEmail,
    ) -> impl Future<Output = Result<(), ActionExecutionError>> + Send {
        (**self).send(email)
    }
}

impl<T: WebhookClient + Send + Sync> WebhookClient for std::sync::Arc<T> {
    fn call(
        &self,
        request: WebhookRequest,
    ) -> impl Future<Output = Result<u16, ActionExecutionError>> + Send {
        (**self).call(request)
    }
}
