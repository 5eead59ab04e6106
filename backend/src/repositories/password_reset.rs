use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::password_reset::PasswordResetToken;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<PasswordResetToken>, AppError>;

    /// Stores `record`, replacing any earlier token for the same email unless
    /// that token was created after `throttle_cutoff`. Returns false when the
    /// request was throttled and nothing changed.
    async fn issue(
        &self,
        record: &PasswordResetToken,
        throttle_cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn record_failed_attempt(&self, email: &str) -> Result<(), AppError>;

    /// Deletes the token if it still matches and was created after
    /// `created_after`. Exactly one concurrent caller observes `true`.
    async fn consume(
        &self,
        email: &str,
        token_hash: &str,
        created_after: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}

#[derive(Clone)]
pub struct PgPasswordResetRepository {
    pool: PgPool,
}

impl PgPasswordResetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetRepository for PgPasswordResetRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<PasswordResetToken>, AppError> {
        let record = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT email, token_hash, failed_attempts, created_at
            FROM password_reset_tokens
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn issue(
        &self,
        record: &PasswordResetToken,
        throttle_cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (email, token_hash, failed_attempts, created_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (email) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                failed_attempts = 0,
                created_at = EXCLUDED.created_at
            WHERE password_reset_tokens.created_at <= $4
            "#,
        )
        .bind(&record.email)
        .bind(&record.token_hash)
        .bind(record.created_at)
        .bind(throttle_cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_failed_attempt(&self, email: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE password_reset_tokens SET failed_attempts = failed_attempts + 1 WHERE email = $1",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume(
        &self,
        email: &str,
        token_hash: &str,
        created_after: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM password_reset_tokens
            WHERE email = $1
              AND token_hash = $2
              AND created_at > $3
            "#,
        )
        .bind(email)
        .bind(token_hash)
        .bind(created_after)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
