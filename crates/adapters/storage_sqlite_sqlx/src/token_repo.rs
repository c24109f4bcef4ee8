//! `SQLite` implementation of [`IdentityLookup`] over the `api_tokens` and
//! `user_emails` tables.

use sqlx::SqlitePool;

use formflow_app::ports::IdentityLookup;
use formflow_domain::error::FormflowError;
use formflow_domain::id::UserId;

use crate::error::StorageError;

pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register `token` as a credential for `user_id`, replacing any
    /// previous owner of the same token.
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::Storage`] if the write fails.
    pub async fn issue(&self, token: &str, user_id: &UserId) -> Result<(), FormflowError> {
        sqlx::query(
            "INSERT INTO api_tokens (token, user_id) VALUES (?, ?) \
             ON CONFLICT(token) DO UPDATE SET user_id = excluded.user_id",
        )
        .bind(token)
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    /// Record the address `SendEmail` actions and reminders use for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::Storage`] if the write fails.
    pub async fn set_email(&self, user_id: &UserId, email: &str) -> Result<(), FormflowError> {
        sqlx::query(
            "INSERT INTO user_emails (user_id, email) VALUES (?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET email = excluded.email",
        )
        .bind(user_id.as_str())
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }
}

impl IdentityLookup for SqliteTokenRepository {
    async fn authenticate(&self, token: String) -> Result<Option<UserId>, FormflowError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT user_id FROM api_tokens WHERE token = ?")
            .bind(&token)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|(user,)| UserId::new(user)))
    }

    async fn email_of(&self, user: UserId) -> Result<Option<String>, FormflowError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT email FROM user_emails WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|(email,)| email))
    }
}
