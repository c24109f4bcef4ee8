//! `SQLite` implementation of [`EmailTemplateRepository`].
//!
//! Templates are stored as a JSON document next to their owning event.

use sqlx::SqlitePool;

use formflow_app::ports::EmailTemplateRepository;
use formflow_domain::email::EmailTemplate;
use formflow_domain::error::FormflowError;
use formflow_domain::id::EmailTemplateId;

use crate::error::StorageError;

pub struct SqliteEmailTemplateRepository {
    pool: SqlitePool,
}

impl SqliteEmailTemplateRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl EmailTemplateRepository for SqliteEmailTemplateRepository {
    async fn get_by_id(&self, id: EmailTemplateId) -> Result<Option<EmailTemplate>, FormflowError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM email_templates WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        row.map(|(data,)| serde_json::from_str(&data).map_err(StorageError::from))
            .transpose()
            .map_err(FormflowError::from)
    }

    async fn upsert(&self, template: EmailTemplate) -> Result<EmailTemplate, FormflowError> {
        let data = serde_json::to_string(&template).map_err(StorageError::from)?;

        sqlx::query(
            "INSERT INTO email_templates (id, event_id, data) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET event_id = excluded.event_id, data = excluded.data",
        )
        .bind(template.id.to_string())
        .bind(template.event_id.as_str())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::memory_pool;
    use formflow_domain::id::EventId;

    fn template() -> EmailTemplate {
        EmailTemplate {
            id: EmailTemplateId::new(),
            event_id: EventId::new("E1"),
            name: "welcome".to_string(),
            from: "team@example.com".to_string(),
            subject: "Hi {{ subjectID }}".to_string(),
            body: "<p>Thanks</p>".to_string(),
            cc: vec!["cc@example.com".to_string()],
            bcc: vec![],
            reply_to: Some("help@example.com".to_string()),
            is_html: true,
        }
    }

    #[tokio::test]
    async fn should_round_trip_template() {
        let repo = SqliteEmailTemplateRepository::new(memory_pool().await);
        let template = template();

        repo.upsert(template.clone()).await.unwrap();

        assert_eq!(repo.get_by_id(template.id).await.unwrap(), Some(template));
    }

    #[tokio::test]
    async fn should_return_none_for_unknown_template() {
        let repo = SqliteEmailTemplateRepository::new(memory_pool().await);
        assert!(
            repo.get_by_id(EmailTemplateId::new())
                .await
                .unwrap()
                .is_none()
        );
    }
}
