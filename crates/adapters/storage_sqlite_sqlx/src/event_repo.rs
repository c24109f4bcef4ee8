//! `SQLite` implementation of [`EventRepository`].

use std::collections::BTreeSet;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use formflow_app::ports::EventRepository;
use formflow_domain::error::FormflowError;
use formflow_domain::event::Event;
use formflow_domain::id::{EventId, UserId};

use crate::error::{StorageError, decode};

struct Wrapper(Event);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let organizers_json: String = row.try_get("organizer_ids")?;
        let organizer_ids: BTreeSet<UserId> =
            serde_json::from_str(&organizers_json).map_err(decode)?;

        Ok(Self(Event {
            id: EventId::new(id),
            name,
            organizer_ids,
        }))
    }
}

/// `SQLite`-backed platform event directory.
pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl EventRepository for SqliteEventRepository {
    async fn get_by_id(&self, id: EventId) -> Result<Option<Event>, FormflowError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM events WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn upsert(&self, event: Event) -> Result<Event, FormflowError> {
        let organizers_json =
            serde_json::to_string(&event.organizer_ids).map_err(StorageError::from)?;

        sqlx::query(
            "INSERT INTO events (id, name, organizer_ids) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, organizer_ids = excluded.organizer_ids",
        )
        .bind(event.id.as_str())
        .bind(&event.name)
        .bind(&organizers_json)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(event)
    }
}
