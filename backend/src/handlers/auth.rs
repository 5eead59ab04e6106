use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::extract::AppJson,
    models::{
        session::CurrentUser,
        user::{
            AuthPayload, ForgotPasswordRequest, LoginRequest, RegisterRequest,
            ResetPasswordRequest, UserResponse,
        },
        ApiResponse,
    },
    services::auth::EMAIL_NOT_VERIFIED_MESSAGE,
    state::AppState,
};

pub const REGISTERED_MESSAGE: &str =
    "Registration successful. Please check your email to verify your account.";
pub const LOGGED_OUT_MESSAGE: &str = "Logged out successfully.";
pub const VERIFICATION_SENT_MESSAGE: &str = "A new verification link has been sent to your email address.";
pub const RESET_LINK_SENT_MESSAGE: &str =
    "If an account exists for that email address, a password reset link has been sent.";
pub const PASSWORD_RESET_MESSAGE: &str = "Password has been reset successfully.";

pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthPayload>>), AppError> {
    let payload = state.auth.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(payload).with_message(REGISTERED_MESSAGE)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthPayload>>, AppError> {
    let outcome = state.auth.login(payload).await?;
    let mut response = ApiResponse::data(outcome.payload);
    if !outcome.email_verified {
        response = response.with_message(EMAIL_NOT_VERIFIED_MESSAGE);
        response.email_not_verified = Some(true);
    }
    Ok(Json(response))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.auth.logout(&current).await?;
    Ok(Json(ApiResponse::message(LOGGED_OUT_MESSAGE)))
}

pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::data(UserResponse::from(&current.user)))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.auth.resend_verification(&current.user).await?;
    Ok(Json(ApiResponse::message(VERIFICATION_SENT_MESSAGE)))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.auth.forgot_password(payload).await?;
    Ok(Json(ApiResponse::message(RESET_LINK_SENT_MESSAGE)))
}

pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.auth.reset_password(payload).await?;
    Ok(Json(ApiResponse::message(PASSWORD_RESET_MESSAGE)))
}
