use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::session::SessionToken;
use crate::repositories::transaction::{begin_transaction, commit_transaction};
use crate::types::{SessionTokenId, UserId};

const SESSION_COLUMNS: &str = "id, user_id, name, token_hash, last_used_at, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &SessionToken) -> Result<(), AppError>;

    /// Deletes every token of the session's user and inserts `session`, in one
    /// transaction. Returns the number of revoked tokens.
    async fn replace_for_user(&self, session: &SessionToken) -> Result<u64, AppError>;

    async fn find_by_token_hash(&self, token_hash: &str)
        -> Result<Option<SessionToken>, AppError>;

    async fn touch(&self, id: SessionTokenId, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool, AppError>;

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, AppError>;

    async fn count_for_user(&self, user_id: UserId) -> Result<i64, AppError>;
}

#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_SESSION: &str = "INSERT INTO session_tokens (id, user_id, name, token_hash, last_used_at, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6)";

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, session: &SessionToken) -> Result<(), AppError> {
        sqlx::query(INSERT_SESSION)
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.name)
            .bind(&session.token_hash)
            .bind(session.last_used_at)
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_for_user(&self, session: &SessionToken) -> Result<u64, AppError> {
        let mut tx = begin_transaction(&self.pool).await?;

        let revoked = sqlx::query("DELETE FROM session_tokens WHERE user_id = $1")
            .bind(session.user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(INSERT_SESSION)
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.name)
            .bind(&session.token_hash)
            .bind(session.last_used_at)
            .bind(session.created_at)
            .execute(&mut *tx)
            .await?;

        commit_transaction(tx).await?;
        Ok(revoked)
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<SessionToken>, AppError> {
        let query = format!(
            "SELECT {} FROM session_tokens WHERE token_hash = $1",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, SessionToken>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn touch(&self, id: SessionTokenId, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE session_tokens SET last_used_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM session_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM session_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_for_user(&self, user_id: UserId) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM session_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
