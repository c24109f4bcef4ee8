//! `SQLite` implementation of [`TimerStore`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use formflow_app::ports::TimerStore;
use formflow_domain::error::FormflowError;
use formflow_domain::execution::ExecutionKey;
use formflow_domain::id::{FormId, UserId};
use formflow_domain::time::Timestamp;
use formflow_domain::timer::{ScheduledTimer, TimerKind, TimerState};

use crate::codec::{action_index, from_millis, key_from_row, to_millis};
use crate::error::{StorageError, decode_msg};

struct Wrapper(ScheduledTimer);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let fire_at: i64 = row.try_get("fire_at")?;
        let form_id: String = row.try_get("form_id")?;
        let user_id: String = row.try_get("user_id")?;
        let email: Option<String> = row.try_get("email")?;
        let state: String = row.try_get("state")?;

        Ok(Self(ScheduledTimer {
            key: key_from_row(row, "pipeline_id", "action_index", "occurrence_id")?,
            kind: TimerKind::from_str(&kind).map_err(decode_msg)?,
            fire_at: from_millis(fire_at)?,
            form_id: FormId::new(form_id),
            user_id: UserId::new(user_id),
            email,
            state: TimerState::from_str(&state).map_err(decode_msg)?,
        }))
    }
}

/// `SQLite`-backed durable timers.
pub struct SqliteTimerStore {
    pool: SqlitePool,
}

impl SqliteTimerStore {
    /// Create a new store backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TimerStore for SqliteTimerStore {
    async fn schedule(&self, timer: ScheduledTimer) -> Result<(), FormflowError> {
        sqlx::query(
            "INSERT INTO scheduled_timers (pipeline_id, action_index, occurrence_id, kind, fire_at, form_id, user_id, email, state) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(pipeline_id, action_index, occurrence_id, kind) DO NOTHING",
        )
        .bind(timer.key.pipeline_id.to_string())
        .bind(action_index(timer.key.action_index))
        .bind(timer.key.occurrence_id.to_string())
        .bind(timer.kind.as_str())
        .bind(to_millis(timer.fire_at))
        .bind(timer.form_id.as_str())
        .bind(timer.user_id.as_str())
        .bind(&timer.email)
        .bind(timer.state.as_str())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn due(&self, now: Timestamp, limit: usize) -> Result<Vec<ScheduledTimer>, FormflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM scheduled_timers WHERE state = ? AND fire_at <= ? ORDER BY fire_at, rowid LIMIT ?",
        )
        .bind(TimerState::Pending.as_str())
        .bind(to_millis(now))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn mark(
        &self,
        key: ExecutionKey,
        kind: TimerKind,
        state: TimerState,
    ) -> Result<(), FormflowError> {
        sqlx::query(
            "UPDATE scheduled_timers SET state = ? \
             WHERE pipeline_id = ? AND action_index = ? AND occurrence_id = ? AND kind = ?",
        )
        .bind(state.as_str())
        .bind(key.pipeline_id.to_string())
        .bind(action_index(key.action_index))
        .bind(key.occurrence_id.to_string())
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn get(
        &self,
        key: ExecutionKey,
        kind: TimerKind,
    ) -> Result<Option<ScheduledTimer>, FormflowError> {
        let row: Option<Wrapper> = sqlx::query_as(
            "SELECT * FROM scheduled_timers \
             WHERE pipeline_id = ? AND action_index = ? AND occurrence_id = ? AND kind = ?",
        )
        .bind(key.pipeline_id.to_string())
        .bind(action_index(key.action_index))
        .bind(key.occurrence_id.to_string())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }
}
