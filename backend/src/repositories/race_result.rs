use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::race_result::RaceResult;
use crate::types::{RaceResultId, UserId};

const RACE_RESULT_COLUMNS: &str = "id, user_id, race_date, location, race_type, swim_time, t1_time, \
     bike_time, t2_time, run_time, total_time, age_group, overall_position, age_group_position, \
     created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RaceResultRepository: Send + Sync {
    /// Latest race first.
    async fn list_page(&self, limit: i64, offset: i64) -> Result<Vec<RaceResult>, AppError>;

    async fn count(&self) -> Result<i64, AppError>;

    /// Latest race first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<RaceResult>, AppError>;

    async fn find_by_id(&self, id: RaceResultId) -> Result<Option<RaceResult>, AppError>;

    async fn create(&self, result: &RaceResult) -> Result<RaceResult, AppError>;

    async fn update(&self, result: &RaceResult) -> Result<RaceResult, AppError>;

    async fn delete(&self, id: RaceResultId) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgRaceResultRepository {
    pool: PgPool,
}

impl PgRaceResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RaceResultRepository for PgRaceResultRepository {
    async fn list_page(&self, limit: i64, offset: i64) -> Result<Vec<RaceResult>, AppError> {
        let query = format!(
            "SELECT {} FROM race_results \
             ORDER BY race_date DESC, created_at DESC LIMIT $1 OFFSET $2",
            RACE_RESULT_COLUMNS
        );
        let rows = sqlx::query_as::<_, RaceResult>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM race_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<RaceResult>, AppError> {
        let query = format!(
            "SELECT {} FROM race_results WHERE user_id = $1 \
             ORDER BY race_date DESC, created_at DESC",
            RACE_RESULT_COLUMNS
        );
        let rows = sqlx::query_as::<_, RaceResult>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: RaceResultId) -> Result<Option<RaceResult>, AppError> {
        let query = format!("SELECT {} FROM race_results WHERE id = $1", RACE_RESULT_COLUMNS);
        let row = sqlx::query_as::<_, RaceResult>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create(&self, result: &RaceResult) -> Result<RaceResult, AppError> {
        let query = format!(
            "INSERT INTO race_results (id, user_id, race_date, location, race_type, swim_time, \
             t1_time, bike_time, t2_time, run_time, total_time, age_group, overall_position, \
             age_group_position, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {}",
            RACE_RESULT_COLUMNS
        );
        let row = sqlx::query_as::<_, RaceResult>(&query)
            .bind(result.id)
            .bind(result.user_id)
            .bind(result.race_date)
            .bind(&result.location)
            .bind(result.race_type)
            .bind(result.swim_time)
            .bind(result.t1_time)
            .bind(result.bike_time)
            .bind(result.t2_time)
            .bind(result.run_time)
            .bind(result.total_time)
            .bind(&result.age_group)
            .bind(result.overall_position)
            .bind(result.age_group_position)
            .bind(result.created_at)
            .bind(result.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update(&self, result: &RaceResult) -> Result<RaceResult, AppError> {
        let query = format!(
            "UPDATE race_results SET race_date = $1, location = $2, race_type = $3, \
             swim_time = $4, t1_time = $5, bike_time = $6, t2_time = $7, run_time = $8, \
             total_time = $9, age_group = $10, overall_position = $11, \
             age_group_position = $12, updated_at = $13 \
             WHERE id = $14 \
             RETURNING {}",
            RACE_RESULT_COLUMNS
        );
        let row = sqlx::query_as::<_, RaceResult>(&query)
            .bind(result.race_date)
            .bind(&result.location)
            .bind(result.race_type)
            .bind(result.swim_time)
            .bind(result.t1_time)
            .bind(result.bike_time)
            .bind(result.t2_time)
            .bind(result.run_time)
            .bind(result.total_time)
            .bind(&result.age_group)
            .bind(result.overall_position)
            .bind(result.age_group_position)
            .bind(result.updated_at)
            .bind(result.id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("race_result", "Race result not found."))?;
        Ok(row)
    }

    async fn delete(&self, id: RaceResultId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM race_results WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
