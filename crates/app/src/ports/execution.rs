//! Execution ports: the idempotency ledger, access grants and durable timers.

use std::future::Future;

use formflow_domain::access::AccessGrant;
use formflow_domain::error::FormflowError;
use formflow_domain::execution::{ExecutionKey, ExecutionStatus};
use formflow_domain::id::{FormId, UserId};
use formflow_domain::time::Timestamp;
use formflow_domain::timer::{ScheduledTimer, TimerKind, TimerState};

/// Durable record of which action runs already happened.
pub trait ExecutionLog {
    /// Atomically mark `key` as in progress.
    ///
    /// Returns `true` when the caller now owns the run: the key was unknown,
    /// its previous attempt failed, or an earlier claim was abandoned in
    /// progress for longer than the implementation's lease. Returns `false`
    /// when it succeeded or is held by a live claim.
    fn claim(&self, key: ExecutionKey) -> impl Future<Output = Result<bool, FormflowError>> + Send;

    /// Record the final status of a claimed run.
    fn complete(
        &self,
        key: ExecutionKey,
        status: ExecutionStatus,
        detail: Option<String>,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send;

    fn status(
        &self,
        key: ExecutionKey,
    ) -> impl Future<Output = Result<Option<ExecutionStatus>, FormflowError>> + Send;
}

/// At most one grant per `(form, user)`.
pub trait AccessGrantRepository {
    /// Create the grant, or extend the existing one and transfer its
    /// ownership to `grant.source`. Returns the stored grant.
    fn grant(
        &self,
        grant: AccessGrant,
    ) -> impl Future<Output = Result<AccessGrant, FormflowError>> + Send;

    fn get(
        &self,
        form_id: FormId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<AccessGrant>, FormflowError>> + Send;

    /// Revoke the grant only if it is active and still owned by `source`.
    /// Returns whether anything was revoked.
    fn revoke_if_owned(
        &self,
        form_id: FormId,
        user_id: UserId,
        source: ExecutionKey,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, FormflowError>> + Send;
}

/// Persisted deferred actions.
pub trait TimerStore {
    /// Insert a pending timer. Scheduling the same `(key, kind)` twice keeps
    /// the first one.
    fn schedule(
        &self,
        timer: ScheduledTimer,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send;

    /// Pending timers with `fire_at <= now`, earliest first.
    fn due(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScheduledTimer>, FormflowError>> + Send;

    fn mark(
        &self,
        key: ExecutionKey,
        kind: TimerKind,
        state: TimerState,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send;

    fn get(
        &self,
        key: ExecutionKey,
        kind: TimerKind,
    ) -> impl Future<Output = Result<Option<ScheduledTimer>, FormflowError>> + Send;
}

impl<T: ExecutionLog + Send + Sync> ExecutionLog for std::sync::Arc<T> {
    fn claim(&self, key: ExecutionKey) -> impl Future<Output = Result<bool, FormflowError>> + Send {
        (**self).claim(key)
    }

    fn complete(
        &self,
        key: ExecutionKey,
        status: ExecutionStatus,
        detail: Option<String>,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        (**self).complete(key, status, detail)
    }

    fn status(
        &self,
        key: ExecutionKey,
    ) -> impl Future<Output = Result<Option<ExecutionStatus>, FormflowError>> + Send {
        (**self).status(key)
    }
}

impl<T: AccessGrantRepository + Send + Sync> AccessGrantRepository for std::sync::Arc<T> {
    fn grant(
        &self,
        grant: AccessGrant,
    ) -> impl Future<Output = Result<AccessGrant, FormflowError>> + Send {
        (**self).grant(grant)
    }

    fn get(
        &self,
        form_id: FormId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<AccessGrant>, FormflowError>> + Send {
        (**self).get(form_id, user_id)
    }

    fn revoke_if_owned(
        &self,
        form_id: FormId,
        user_id: UserId,
        source: ExecutionKey,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, FormflowError>> + Send {
        (**self).revoke_if_owned(form_id, user_id, source, at)
    }
}

impl<T: TimerStore + Send + Sync> TimerStore for std::sync::Arc<T> {
    fn schedule(
        &self,
        timer: ScheduledTimer,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        (**self).schedule(timer)
    }

    fn due(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScheduledTimer>, FormflowError>> + Send {
        (**self).due(now, limit)
    }

    fn mark(
        &self,
        key: ExecutionKey,
        kind: TimerKind,
        state: TimerState,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        (**self).mark(key, kind, state)
    }

    fn get(
        &self,
        key: ExecutionKey,
        kind: TimerKind,
    ) -> impl Future<Output = Result<Option<ScheduledTimer>, FormflowError>> + Send {
        (**self).get(key, kind)
    }
}
