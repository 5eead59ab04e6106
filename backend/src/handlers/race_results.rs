use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::extract::{AppJson, AppPath, AppQuery},
    models::{
        race_result::{CreateRaceResultRequest, RaceResultResponse},
        session::CurrentUser,
        ApiResponse, PageQuery,
    },
    state::AppState,
    types::{RaceResultId, UserId},
};

pub async fn list_race_results(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<ApiResponse<Vec<RaceResultResponse>>>, AppError> {
    let page = state.race_results.list(query.page()).await?;
    Ok(Json(ApiResponse::from(page)))
}

pub async fn get_race_result(
    State(state): State<AppState>,
    AppPath(id): AppPath<RaceResultId>,
) -> Result<Json<ApiResponse<RaceResultResponse>>, AppError> {
    let result = state.race_results.show(id).await?;
    Ok(Json(ApiResponse::data(result)))
}

pub async fn list_user_race_results(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<UserId>,
) -> Result<Json<ApiResponse<Vec<RaceResultResponse>>>, AppError> {
    let results = state.race_results.list_for_user(user_id).await?;
    Ok(Json(ApiResponse::data(results)))
}

pub async fn create_race_result(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    AppJson(payload): AppJson<CreateRaceResultRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RaceResultResponse>>), AppError> {
    let result = state.race_results.create(&current.user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(result).with_message("Race result created.")),
    ))
}

/// Takes the raw body so ownership is settled before the payload is parsed.
pub async fn update_race_result(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    AppPath(id): AppPath<RaceResultId>,
    body: Bytes,
) -> Result<Json<ApiResponse<RaceResultResponse>>, AppError> {
    let result = state.race_results.update(&current.user, id, &body).await?;
    Ok(Json(
        ApiResponse::data(result).with_message("Race result updated."),
    ))
}

pub async fn delete_race_result(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    AppPath(id): AppPath<RaceResultId>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.race_results.delete(&current.user, id).await?;
    Ok(Json(ApiResponse::message("Race result deleted.")))
}
