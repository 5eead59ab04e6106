use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::profile::{Profile, ProfileChanges};
use crate::repositories::transaction::{begin_transaction, commit_transaction};
use crate::types::{ProfileId, UserId};

const PROFILE_COLUMNS: &str =
    "id, user_id, role, ironman_number, bio, social_links, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Profile>, AppError>;

    /// Inserts `profile` unless the user already has one. Returns true when a
    /// row was inserted.
    async fn create_if_absent(&self, profile: &Profile) -> Result<bool, AppError>;

    /// Creates the profile when missing, then applies `changes` to it.
    async fn upsert(
        &self,
        user_id: UserId,
        changes: &ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<Profile, AppError>;
}

#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_IF_ABSENT: &str = "INSERT INTO user_profiles (id, user_id, role, created_at, updated_at) \
     VALUES ($1, $2, $3, $4, $4) \
     ON CONFLICT (user_id) DO NOTHING";

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Profile>, AppError> {
        let query = format!(
            "SELECT {} FROM user_profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn create_if_absent(&self, profile: &Profile) -> Result<bool, AppError> {
        let result = sqlx::query(INSERT_IF_ABSENT)
            .bind(profile.id)
            .bind(profile.user_id)
            .bind(profile.role)
            .bind(profile.created_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert(
        &self,
        user_id: UserId,
        changes: &ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<Profile, AppError> {
        let mut tx = begin_transaction(&self.pool).await?;

        sqlx::query(INSERT_IF_ABSENT)
            .bind(ProfileId::new())
            .bind(user_id)
            .bind(changes.role.unwrap_or_default())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "SELECT {} FROM user_profiles WHERE user_id = $1 FOR UPDATE",
            PROFILE_COLUMNS
        );
        let mut profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        changes.apply(&mut profile, now);

        let query = format!(
            "UPDATE user_profiles \
             SET role = $1, ironman_number = $2, bio = $3, social_links = $4, updated_at = $5 \
             WHERE id = $6 \
             RETURNING {}",
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(profile.role)
            .bind(&profile.ironman_number)
            .bind(&profile.bio)
            .bind(&profile.social_links)
            .bind(profile.updated_at)
            .bind(profile.id)
            .fetch_one(&mut *tx)
            .await?;

        commit_transaction(tx).await?;
        Ok(profile)
    }
}

