//! `SQLite` implementation of [`AccessGrantRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use formflow_app::ports::AccessGrantRepository;
use formflow_domain::access::AccessGrant;
use formflow_domain::error::FormflowError;
use formflow_domain::execution::ExecutionKey;
use formflow_domain::id::{FormId, UserId};
use formflow_domain::time::Timestamp;

use crate::codec::{action_index, from_millis, key_from_row, to_millis};
use crate::error::StorageError;

struct Wrapper(AccessGrant);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let form_id: String = row.try_get("form_id")?;
        let user_id: String = row.try_get("user_id")?;
        let granted_at: i64 = row.try_get("granted_at")?;
        let expires_at: i64 = row.try_get("expires_at")?;
        let revoked_at: Option<i64> = row.try_get("revoked_at")?;

        Ok(Self(AccessGrant {
            form_id: FormId::new(form_id),
            user_id: UserId::new(user_id),
            granted_at: from_millis(granted_at)?,
            expires_at: from_millis(expires_at)?,
            source: key_from_row(
                row,
                "source_pipeline_id",
                "source_action_index",
                "source_occurrence_id",
            )?,
            revoked_at: revoked_at.map(from_millis).transpose()?,
        }))
    }
}

/// `SQLite`-backed access grants, one row per `(form, user)`.
pub struct SqliteAccessGrantRepository {
    pool: SqlitePool,
}

impl SqliteAccessGrantRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AccessGrantRepository for SqliteAccessGrantRepository {
    async fn grant(&self, grant: AccessGrant) -> Result<AccessGrant, FormflowError> {
        let row: Wrapper = sqlx::query_as(
            "INSERT INTO access_grants (form_id, user_id, granted_at, expires_at, source_pipeline_id, source_action_index, source_occurrence_id, revoked_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, NULL) \
             ON CONFLICT(form_id, user_id) DO UPDATE SET \
                 granted_at = excluded.granted_at, \
                 expires_at = MAX(access_grants.expires_at, excluded.expires_at), \
                 source_pipeline_id = excluded.source_pipeline_id, \
                 source_action_index = excluded.source_action_index, \
                 source_occurrence_id = excluded.source_occurrence_id, \
                 revoked_at = NULL \
             RETURNING *",
        )
        .bind(grant.form_id.as_str())
        .bind(grant.user_id.as_str())
        .bind(to_millis(grant.granted_at))
        .bind(to_millis(grant.expires_at))
        .bind(grant.source.pipeline_id.to_string())
        .bind(action_index(grant.source.action_index))
        .bind(grant.source.occurrence_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(row.0)
    }

    async fn get(
        &self,
        form_id: FormId,
        user_id: UserId,
    ) -> Result<Option<AccessGrant>, FormflowError> {
        let row: Option<Wrapper> =
            sqlx::query_as("SELECT * FROM access_grants WHERE form_id = ? AND user_id = ?")
                .bind(form_id.as_str())
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn revoke_if_owned(
        &self,
        form_id: FormId,
        user_id: UserId,
        source: ExecutionKey,
        at: Timestamp,
    ) -> Result<bool, FormflowError> {
        let result = sqlx::query(
            "UPDATE access_grants SET revoked_at = ? \
             WHERE form_id = ? AND user_id = ? AND revoked_at IS NULL \
               AND source_pipeline_id = ? AND source_action_index = ? AND source_occurrence_id = ?",
        )
        .bind(to_millis(at))
        .bind(form_id.as_str())
        .bind(user_id.as_str())
        .bind(source.pipeline_id.to_string())
        .bind(action_index(source.action_index))
        .bind(source.occurrence_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(result.rows_affected() > 0)
    }
}
