//! `SQLite` implementation of [`PipelineRepository`].
//!
//! The trigger type and form id are denormalized into their own columns so
//! matching is an indexed lookup. Candidates come back in insertion order
//! (`rowid`), which an update does not disturb.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use formflow_app::ports::PipelineRepository;
use formflow_domain::error::{FormflowError, NotFoundError};
use formflow_domain::id::{EventId, FormId, PipelineId};
use formflow_domain::pipeline::{PipelineAction, PipelineConfiguration, PipelineEvent};

use crate::error::{StorageError, decode};

struct Wrapper(PipelineConfiguration);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let event_id: String = row.try_get("event_id")?;
        let trigger_json: String = row.try_get("trigger_data")?;
        let actions_json: String = row.try_get("actions")?;
        let updated_at: String = row.try_get("updated_at")?;

        let id = PipelineId::from_str(&id).map_err(decode)?;
        let event: PipelineEvent = serde_json::from_str(&trigger_json).map_err(decode)?;
        let actions: Vec<PipelineAction> = serde_json::from_str(&actions_json).map_err(decode)?;
        let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.to_utc())
            .map_err(decode)?;

        Ok(Self(PipelineConfiguration {
            id,
            event,
            actions,
            event_id: EventId::new(event_id),
            updated_at,
        }))
    }
}

fn not_found(id: PipelineId) -> FormflowError {
    NotFoundError {
        entity: "Pipeline",
        id: id.to_string(),
    }
    .into()
}

/// `SQLite`-backed rule store.
pub struct SqlitePipelineRepository {
    pool: SqlitePool,
}

impl SqlitePipelineRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl PipelineRepository for SqlitePipelineRepository {
    async fn create(
        &self,
        pipeline: PipelineConfiguration,
    ) -> Result<PipelineConfiguration, FormflowError> {
        let trigger_json = serde_json::to_string(&pipeline.event).map_err(StorageError::from)?;
        let actions_json = serde_json::to_string(&pipeline.actions).map_err(StorageError::from)?;

        sqlx::query(
            "INSERT INTO pipelines (id, event_id, trigger_type, trigger_form_id, trigger_data, actions, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(pipeline.id.to_string())
        .bind(pipeline.event_id.as_str())
        .bind(pipeline.event.discriminator())
        .bind(pipeline.event.form_id().as_str())
        .bind(&trigger_json)
        .bind(&actions_json)
        .bind(pipeline.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(pipeline)
    }

    async fn get_by_id(
        &self,
        id: PipelineId,
    ) -> Result<Option<PipelineConfiguration>, FormflowError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM pipelines WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn update(
        &self,
        pipeline: PipelineConfiguration,
    ) -> Result<PipelineConfiguration, FormflowError> {
        let trigger_json = serde_json::to_string(&pipeline.event).map_err(StorageError::from)?;
        let actions_json = serde_json::to_string(&pipeline.actions).map_err(StorageError::from)?;

        let result = sqlx::query(
            "UPDATE pipelines SET event_id = ?, trigger_type = ?, trigger_form_id = ?, trigger_data = ?, actions = ?, updated_at = ? WHERE id = ?",
        )
        .bind(pipeline.event_id.as_str())
        .bind(pipeline.event.discriminator())
        .bind(pipeline.event.form_id().as_str())
        .bind(&trigger_json)
        .bind(&actions_json)
        .bind(pipeline.updated_at.to_rfc3339())
        .bind(pipeline.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(not_found(pipeline.id));
        }
        Ok(pipeline)
    }

    async fn delete(&self, id: PipelineId) -> Result<(), FormflowError> {
        let result = sqlx::query("DELETE FROM pipelines WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn list_candidates(
        &self,
        discriminator: &'static str,
        form_id: FormId,
    ) -> Result<Vec<PipelineConfiguration>, FormflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM pipelines WHERE trigger_type = ? AND trigger_form_id = ? ORDER BY rowid",
        )
        .bind(discriminator)
        .bind(form_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn list_by_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<PipelineConfiguration>, FormflowError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM pipelines WHERE event_id = ? ORDER BY rowid")
                .bind(event_id.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
