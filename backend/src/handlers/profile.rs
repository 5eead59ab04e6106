use axum::{
    extract::{multipart::MultipartRejection, Extension, Multipart, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::extract::{AppJson, AppPath, AppQuery},
    models::{
        photo::{AvatarPayload, PhotoResponse, SetAvatarRequest, UploadedFile, UploadedPhotos},
        profile::UpdateProfileRequest,
        session::CurrentUser,
        user::UserResponse,
        ApiResponse, PageQuery,
    },
    state::AppState,
    types::PhotoId,
};

pub const PHOTOS_FIELD: &str = "photos";

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let user = state.profiles.get_profile(&current.user).await?;
    Ok(Json(ApiResponse::data(user)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let user = state.profiles.update_profile(&current.user, payload).await?;
    Ok(Json(
        ApiResponse::data(user).with_message("Profile updated successfully."),
    ))
}

pub async fn list_photos(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<ApiResponse<Vec<PhotoResponse>>>, AppError> {
    let page = state
        .profiles
        .list_photos(current.user.id, query.page(), query.per_page)
        .await?;
    Ok(Json(ApiResponse::from(page)))
}

pub async fn upload_photos(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UploadedPhotos>>), AppError> {
    let files = read_photo_fields(multipart?).await?;
    let photos = state.profiles.upload_photos(current.user.id, files).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(UploadedPhotos { photos }).with_message("Photos uploaded successfully.")),
    ))
}

pub async fn set_avatar(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    AppJson(payload): AppJson<SetAvatarRequest>,
) -> Result<Json<ApiResponse<AvatarPayload>>, AppError> {
    let avatar = state.profiles.set_avatar(current.user.id, payload).await?;
    Ok(Json(
        ApiResponse::data(AvatarPayload { avatar }).with_message("Avatar updated successfully."),
    ))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    AppPath(photo_id): AppPath<PhotoId>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.profiles.delete_photo(current.user.id, photo_id).await?;
    Ok(Json(ApiResponse::message("Photo deleted successfully.")))
}

/// Collects every `photos` / `photos[]` / `photos[n]` part; other parts are ignored.
async fn read_photo_fields(mut multipart: Multipart) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::validation(PHOTOS_FIELD, err.body_text()))?
    {
        if !is_photo_field(field.name().unwrap_or_default()) {
            continue;
        }
        let client_name = field.file_name().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::validation(PHOTOS_FIELD, err.body_text()))?;
        files.push(UploadedFile {
            client_name,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

fn is_photo_field(name: &str) -> bool {
    match name.strip_prefix(PHOTOS_FIELD) {
        Some("") => true,
        Some(rest) => rest.starts_with('[') && rest.ends_with(']'),
        None => false,
    }
}
