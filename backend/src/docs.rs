#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::models::{
    photo::{AvatarPayload, PhotoResponse, SetAvatarRequest, UploadedPhotos},
    profile::{ProfileResponse, ProfileRole, SocialLinks, UpdateProfileRequest},
    race_result::{
        CreateRaceResultRequest, RaceResultResponse, RaceType, UpdateRaceResultRequest,
    },
    user::{
        AuthPayload, ForgotPasswordRequest, LoginRequest, PublicUser, RegisterRequest,
        ResetPasswordRequest, UserResponse,
    },
    PageMeta, PageQuery,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        register_doc,
        login_doc,
        logout_doc,
        me_doc,
        resend_verification_doc,
        forgot_password_doc,
        reset_password_doc,
        get_profile_doc,
        update_profile_doc,
        list_photos_doc,
        upload_photos_doc,
        set_avatar_doc,
        delete_photo_doc,
        list_race_results_doc,
        get_race_result_doc,
        list_user_race_results_doc,
        create_race_result_doc,
        update_race_result_doc,
        delete_race_result_doc
    ),
    components(
        schemas(
            // auth
            RegisterRequest,
            LoginRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            AuthPayload,
            UserResponse,
            PublicUser,
            // profile & photos
            UpdateProfileRequest,
            ProfileResponse,
            ProfileRole,
            SocialLinks,
            PhotoResponse,
            SetAvatarRequest,
            UploadedPhotos,
            AvatarPayload,
            // race results
            RaceType,
            CreateRaceResultRequest,
            UpdateRaceResultRequest,
            RaceResultResponse,
            PageMeta
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Registration, sessions, email verification and password reset"),
        (name = "Profile", description = "Athlete profile, photo gallery and avatar"),
        (name = "RaceResults", description = "Race results, publicly readable and owner-editable")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.description = Some("Opaque session token issued by register or login".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, session token issued", body = AuthPayload),
        (status = 422, description = "Validation failed")
    ),
    tag = "Auth",
    security(())
)]
fn register_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; other sessions revoked", body = AuthPayload),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Current session revoked"),
        (status = 401, description = "Unauthenticated")
    ),
    tag = "Auth"
)]
fn logout_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/auth/user",
    responses((status = 200, description = "Signed-in user", body = UserResponse)),
    tag = "Auth"
)]
fn me_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/email/resend-verification",
    responses(
        (status = 200, description = "Verification email queued"),
        (status = 422, description = "Email already verified")
    ),
    tag = "Auth"
)]
fn resend_verification_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Same response whether or not the account exists"),
        (status = 422, description = "Malformed email")
    ),
    tag = "Auth",
    security(())
)]
fn forgot_password_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed; every session revoked"),
        (status = 422, description = "Invalid token, unknown user, throttled or validation failure")
    ),
    tag = "Auth",
    security(())
)]
fn reset_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/user/profile",
    responses((status = 200, description = "User with profile (null before verification)", body = UserResponse)),
    tag = "Profile"
)]
fn get_profile_doc() {}

#[utoipa::path(
    put,
    path = "/api/v1/user/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile created or updated", body = UserResponse),
        (status = 422, description = "Validation failed")
    ),
    tag = "Profile"
)]
fn update_profile_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/user/photos",
    params(PageQuery),
    responses((status = 200, description = "Newest photos first, paginated", body = [PhotoResponse])),
    tag = "Profile"
)]
fn list_photos_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/user/photos",
    request_body(content_type = "multipart/form-data", description = "One or more `photos` file parts"),
    responses(
        (status = 201, description = "Photos stored", body = UploadedPhotos),
        (status = 422, description = "Missing, too many, too large or unsupported files")
    ),
    tag = "Profile"
)]
fn upload_photos_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/user/profile/avatar",
    request_body = SetAvatarRequest,
    responses(
        (status = 200, description = "Avatar changed", body = AvatarPayload),
        (status = 422, description = "Photo not found or not owned")
    ),
    tag = "Profile"
)]
fn set_avatar_doc() {}

#[utoipa::path(
    delete,
    path = "/api/v1/user/photos/{id}",
    params(("id" = String, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Photo deleted"),
        (status = 404, description = "Photo not found")
    ),
    tag = "Profile"
)]
fn delete_photo_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/race-results",
    params(PageQuery),
    responses((status = 200, description = "Most recent race first, paginated", body = [RaceResultResponse])),
    tag = "RaceResults",
    security(())
)]
fn list_race_results_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/race-results/{id}",
    params(("id" = String, Path, description = "Race result id")),
    responses(
        (status = 200, description = "Race result with its owner", body = RaceResultResponse),
        (status = 404, description = "Not found")
    ),
    tag = "RaceResults",
    security(())
)]
fn get_race_result_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/race-results",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The user's race results, most recent first", body = [RaceResultResponse]),
        (status = 404, description = "User not found")
    ),
    tag = "RaceResults",
    security(())
)]
fn list_user_race_results_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/race-results",
    request_body = CreateRaceResultRequest,
    responses(
        (status = 201, description = "Race result created", body = RaceResultResponse),
        (status = 422, description = "Validation failed")
    ),
    tag = "RaceResults"
)]
fn create_race_result_doc() {}

#[utoipa::path(
    put,
    path = "/api/v1/race-results/{id}",
    params(("id" = String, Path, description = "Race result id")),
    request_body = UpdateRaceResultRequest,
    responses(
        (status = 200, description = "Race result updated", body = RaceResultResponse),
        (status = 403, description = "Not the owner"),
        (status = 422, description = "Validation failed")
    ),
    tag = "RaceResults"
)]
fn update_race_result_doc() {}

#[utoipa::path(
    delete,
    path = "/api/v1/race-results/{id}",
    params(("id" = String, Path, description = "Race result id")),
    responses(
        (status = 200, description = "Race result deleted"),
        (status = 403, description = "Not the owner")
    ),
    tag = "RaceResults"
)]
fn delete_race_result_doc() {}
