//! Access grants: timed permission for a user to open a follow-up form.

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionKey;
use crate::id::{FormId, UserId};
use crate::time::Timestamp;

/// Access to `form_id` for `user_id`, valid until `expires_at`.
///
/// At most one grant exists per `(form_id, user_id)`. A newer pipeline run
/// extends it and takes ownership by replacing `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub form_id: FormId,
    pub user_id: UserId,
    pub granted_at: Timestamp,
    pub expires_at: Timestamp,
    /// The action run that currently owns this grant.
    pub source: ExecutionKey,
    pub revoked_at: Option<Timestamp>,
}

impl AccessGrant {
    #[must_use]
    pub fn new(
        form_id: FormId,
        user_id: UserId,
        granted_at: Timestamp,
        expires_at: Timestamp,
        source: ExecutionKey,
    ) -> Self {
        Self {
            form_id,
            user_id,
            granted_at,
            expires_at,
            source,
            revoked_at: None,
        }
    }

    /// `true` when not revoked and `at` is before the expiry.
    #[must_use]
    pub fn is_active(&self, at: Timestamp) -> bool {
        self.revoked_at.is_none() && at < self.expires_at
    }

    /// Whether the action run identified by `key` still owns this grant.
    #[must_use]
    pub fn is_owned_by(&self, key: &ExecutionKey) -> bool {
        self.source == *key
    }

    /// Re-grant on behalf of a newer run: un-revoke, move the expiry and
    /// transfer ownership. The expiry never moves backwards.
    pub fn extend(&mut self, granted_at: Timestamp, expires_at: Timestamp, source: ExecutionKey) {
        self.granted_at = granted_at;
        self.expires_at = self.expires_at.max(expires_at);
        self.source = source;
        self.revoked_at = None;
    }

    pub fn revoke(&mut self, at: Timestamp) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(at);
        }
    }
}
