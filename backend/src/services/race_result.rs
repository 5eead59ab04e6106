//! Race result CRUD with owner-only mutation.

use std::sync::Arc;

use crate::error::AppError;
use crate::models::race_result::{
    CreateRaceResultRequest, RaceResult, RaceResultResponse, UpdateRaceResultRequest,
};
use crate::models::user::{PublicUser, User};
use crate::models::{Page, PageMeta};
use crate::repositories::{RaceResultRepository, UserRepository};
use crate::types::{RaceResultId, UserId};
use crate::utils::Clock;

pub const NOT_OWNER_MESSAGE: &str = "This action is unauthorized.";

fn not_found() -> AppError {
    AppError::not_found("race_result", "Race result not found.")
}

#[derive(Clone)]
pub struct RaceResultService {
    results: Arc<dyn RaceResultRepository>,
    users: Arc<dyn UserRepository>,
    per_page: i64,
    clock: Arc<dyn Clock>,
}

impl RaceResultService {
    pub fn new(
        results: Arc<dyn RaceResultRepository>,
        users: Arc<dyn UserRepository>,
        per_page: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            results,
            users,
            per_page: per_page.max(1),
            clock,
        }
    }

    pub async fn list(&self, page: i64) -> Result<Page<RaceResultResponse>, AppError> {
        let total = self.results.count().await?;
        let meta = PageMeta::new(page.max(1), self.per_page, total);
        let rows = self.results.list_page(meta.per_page, meta.offset()).await?;
        Ok(Page {
            items: rows.iter().map(RaceResultResponse::from).collect(),
            meta,
        })
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<RaceResultResponse>, AppError> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(AppError::not_found("user", "User not found."));
        }
        let rows = self.results.list_for_user(user_id).await?;
        Ok(rows
            .iter()
            .map(|row| RaceResultResponse::from(row).without_user_id())
            .collect())
    }

    pub async fn show(&self, id: RaceResultId) -> Result<RaceResultResponse, AppError> {
        let result = self.results.find_by_id(id).await?.ok_or_else(not_found)?;
        let response = RaceResultResponse::from(&result);
        Ok(match self.users.find_by_id(result.user_id).await? {
            Some(owner) => response.with_user(PublicUser::from(&owner)),
            None => response,
        })
    }

    /// The new record always belongs to `user`.
    pub async fn create(
        &self,
        user: &User,
        request: CreateRaceResultRequest,
    ) -> Result<RaceResultResponse, AppError> {
        let fields = request.into_fields().map_err(AppError::Validation)?;
        let result = RaceResult::new(user.id, fields, self.clock.now());
        let result = self.results.create(&result).await?;
        tracing::info!(user_id = %user.id, race_result_id = %result.id, "Race result created");
        Ok(RaceResultResponse::from(&result))
    }

    async fn owned(&self, user: &User, id: RaceResultId) -> Result<RaceResult, AppError> {
        let result = self.results.find_by_id(id).await?.ok_or_else(not_found)?;
        if result.user_id != user.id {
            return Err(AppError::forbidden(NOT_OWNER_MESSAGE));
        }
        Ok(result)
    }

    /// Ownership is checked before the body is parsed, so a non-owner always
    /// gets 403 whatever the payload.
    pub async fn update(
        &self,
        user: &User,
        id: RaceResultId,
        body: &[u8],
    ) -> Result<RaceResultResponse, AppError> {
        let mut result = self.owned(user, id).await?;

        let request: UpdateRaceResultRequest = if body.iter().all(u8::is_ascii_whitespace) {
            UpdateRaceResultRequest::default()
        } else {
            serde_json::from_slice(body)
                .map_err(|err| AppError::validation("body", format!("Invalid JSON body: {}", err)))?
        };
        let changes = request.into_changes().map_err(AppError::Validation)?;

        changes.apply(&mut result, self.clock.now());
        let result = self.results.update(&result).await?;
        tracing::info!(user_id = %user.id, race_result_id = %result.id, "Race result updated");
        Ok(RaceResultResponse::from(&result))
    }

    pub async fn delete(&self, user: &User, id: RaceResultId) -> Result<(), AppError> {
        let result = self.owned(user, id).await?;
        if !self.results.delete(result.id).await? {
            return Err(not_found());
        }
        tracing::info!(user_id = %user.id, race_result_id = %id, "Race result deleted");
        Ok(())
    }
}
