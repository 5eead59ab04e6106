use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::photo::Photo;
use crate::repositories::transaction::{begin_transaction, commit_transaction};
use crate::types::{PhotoId, UserId};

const PHOTO_COLUMNS: &str = "id, user_id, path, filename, is_avatar, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Photo>, AppError>;

    async fn all_for_user(&self, user_id: UserId) -> Result<Vec<Photo>, AppError>;

    async fn count_for_user(&self, user_id: UserId) -> Result<i64, AppError>;

    async fn find_for_user(&self, user_id: UserId, id: PhotoId)
        -> Result<Option<Photo>, AppError>;

    async fn find_avatar(&self, user_id: UserId) -> Result<Option<Photo>, AppError>;

    async fn create(&self, photo: &Photo) -> Result<Photo, AppError>;

    /// Marks `id` as the user's only avatar. Returns `None` when the photo does
    /// not belong to the user.
    async fn set_avatar(
        &self,
        user_id: UserId,
        id: PhotoId,
        now: DateTime<Utc>,
    ) -> Result<Option<Photo>, AppError>;

    async fn delete_for_user(&self, user_id: UserId, id: PhotoId) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgPhotoRepository {
    pool: PgPool,
}

impl PgPhotoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoRepository for PgPhotoRepository {
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Photo>, AppError> {
        let query = format!(
            "SELECT {} FROM user_photos WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            PHOTO_COLUMNS
        );
        let photos = sqlx::query_as::<_, Photo>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(photos)
    }

    async fn all_for_user(&self, user_id: UserId) -> Result<Vec<Photo>, AppError> {
        let query = format!(
            "SELECT {} FROM user_photos WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            PHOTO_COLUMNS
        );
        let photos = sqlx::query_as::<_, Photo>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(photos)
    }

    async fn count_for_user(&self, user_id: UserId) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_photos WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn find_for_user(
        &self,
        user_id: UserId,
        id: PhotoId,
    ) -> Result<Option<Photo>, AppError> {
        let query = format!(
            "SELECT {} FROM user_photos WHERE id = $1 AND user_id = $2",
            PHOTO_COLUMNS
        );
        let photo = sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(photo)
    }

    async fn find_avatar(&self, user_id: UserId) -> Result<Option<Photo>, AppError> {
        let query = format!(
            "SELECT {} FROM user_photos WHERE user_id = $1 AND is_avatar LIMIT 1",
            PHOTO_COLUMNS
        );
        let photo = sqlx::query_as::<_, Photo>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(photo)
    }

    async fn create(&self, photo: &Photo) -> Result<Photo, AppError> {
        let query = format!(
            "INSERT INTO user_photos (id, user_id, path, filename, is_avatar, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {}",
            PHOTO_COLUMNS
        );
        let row = sqlx::query_as::<_, Photo>(&query)
            .bind(photo.id)
            .bind(photo.user_id)
            .bind(&photo.path)
            .bind(&photo.filename)
            .bind(photo.is_avatar)
            .bind(photo.created_at)
            .bind(photo.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn set_avatar(
        &self,
        user_id: UserId,
        id: PhotoId,
        now: DateTime<Utc>,
    ) -> Result<Option<Photo>, AppError> {
        let mut tx = begin_transaction(&self.pool).await?;

        // Lock every photo of the user so concurrent calls serialise.
        let owned: Vec<PhotoId> = sqlx::query_scalar(
            "SELECT id FROM user_photos WHERE user_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        if !owned.contains(&id) {
            return Ok(None);
        }

        sqlx::query(
            "UPDATE user_photos SET is_avatar = FALSE, updated_at = $1 \
             WHERE user_id = $2 AND is_avatar AND id <> $3",
        )
        .bind(now)
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "UPDATE user_photos SET is_avatar = TRUE, updated_at = $1 \
             WHERE id = $2 AND user_id = $3 \
             RETURNING {}",
            PHOTO_COLUMNS
        );
        let photo = sqlx::query_as::<_, Photo>(&query)
            .bind(now)
            .bind(id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        commit_transaction(tx).await?;
        Ok(Some(photo))
    }

    async fn delete_for_user(&self, user_id: UserId, id: PhotoId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_photos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
