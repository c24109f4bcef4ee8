//! `SQLite` implementation of [`ExecutionLog`].
//!
//! `claim` is a single upsert, so two consumers racing on the same key can
//! never both win. A claim left `in_progress` by a crashed worker can be
//! taken over once it is older than the lease.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;

use formflow_app::ports::ExecutionLog;
use formflow_domain::error::FormflowError;
use formflow_domain::execution::{ExecutionKey, ExecutionStatus};
use formflow_domain::time::Timestamp;

use crate::codec::{action_index, to_millis};
use crate::error::{StorageError, decode_msg};

/// How long an `in_progress` claim is honoured when no lease is configured.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(300);

pub struct SqliteExecutionLog {
    pool: SqlitePool,
    lease_millis: i64,
}

impl SqliteExecutionLog {
    /// Create a new log backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            lease_millis: millis_of(DEFAULT_CLAIM_LEASE),
        }
    }

    /// Age after which an unfinished claim may be taken over. Keep it well
    /// above the slowest action, or a live run may be executed twice.
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease_millis = millis_of(lease);
        self
    }

    async fn claim_at(&self, key: ExecutionKey, at: Timestamp) -> Result<bool, FormflowError> {
        let at = to_millis(at);
        let result = sqlx::query(
            "INSERT INTO execution_log (pipeline_id, action_index, occurrence_id, status, detail, updated_at) \
             VALUES (?, ?, ?, ?, NULL, ?) \
             ON CONFLICT(pipeline_id, action_index, occurrence_id) DO UPDATE \
             SET status = excluded.status, detail = NULL, updated_at = excluded.updated_at \
             WHERE execution_log.status = ? \
                OR (execution_log.status = ? AND execution_log.updated_at < ?)",
        )
        .bind(key.pipeline_id.to_string())
        .bind(action_index(key.action_index))
        .bind(key.occurrence_id.to_string())
        .bind(ExecutionStatus::InProgress.as_str())
        .bind(at)
        .bind(ExecutionStatus::Failed.as_str())
        .bind(ExecutionStatus::InProgress.as_str())
        .bind(at.saturating_sub(self.lease_millis))
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        let claimed = result.rows_affected() > 0;
        if !claimed {
            tracing::trace!(execution = %key, "claim refused");
        }
        Ok(claimed)
    }
}

fn millis_of(lease: Duration) -> i64 {
    i64::try_from(lease.as_millis()).unwrap_or(i64::MAX)
}

impl ExecutionLog for SqliteExecutionLog {
    async fn claim(&self, key: ExecutionKey) -> Result<bool, FormflowError> {
        self.claim_at(key, formflow_domain::time::now()).await
    }

    async fn complete(
        &self,
        key: ExecutionKey,
        status: ExecutionStatus,
        detail: Option<String>,
    ) -> Result<(), FormflowError> {
        sqlx::query(
            "INSERT INTO execution_log (pipeline_id, action_index, occurrence_id, status, detail, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(pipeline_id, action_index, occurrence_id) DO UPDATE \
             SET status = excluded.status, detail = excluded.detail, updated_at = excluded.updated_at",
        )
        .bind(key.pipeline_id.to_string())
        .bind(action_index(key.action_index))
        .bind(key.occurrence_id.to_string())
        .bind(status.as_str())
        .bind(detail)
        .bind(to_millis(formflow_domain::time::now()))
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn status(&self, key: ExecutionKey) -> Result<Option<ExecutionStatus>, FormflowError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM execution_log WHERE pipeline_id = ? AND action_index = ? AND occurrence_id = ?",
        )
        .bind(key.pipeline_id.to_string())
        .bind(action_index(key.action_index))
        .bind(key.occurrence_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;

        row.map(|(status,)| ExecutionStatus::from_str(&status).map_err(decode_msg))
            .transpose()
            .map_err(|err| StorageError::from(err).into())
    }
}
