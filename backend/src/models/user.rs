//! Models that represent users and authentication payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::profile::ProfileResponse;
use crate::types::UserId;
use crate::validation::rules;

#[derive(Debug, Clone, FromRow)]
/// Database representation of a registered account.
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Stored lower-cased; uniqueness is case-insensitive.
    pub email: String,
    pub password_hash: String,
    /// Set exactly once, when the email address is confirmed.
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: &str, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            name,
            email: normalize_email(email),
            password_hash,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_verified_email(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(
        custom(function = "rules::validate_required"),
        length(max = 255)
    )]
    pub name: String,
    #[validate(
        custom(function = "rules::validate_required_email"),
        length(max = 255)
    )]
    pub email: String,
    #[validate(
        custom(function = "rules::validate_password"),
        must_match(other = "password_confirmation")
    )]
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(custom(function = "rules::validate_required_email"))]
    pub email: String,
    #[validate(custom(function = "rules::validate_required"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    #[validate(custom(function = "rules::validate_required_email"))]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "rules::validate_required"))]
    pub token: String,
    #[validate(custom(function = "rules::validate_required_email"))]
    pub email: String,
    #[validate(
        custom(function = "rules::validate_password"),
        must_match(other = "password_confirmation")
    )]
    pub password: String,
    pub password_confirmation: String,
}

/// Public representation of the signed-in user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub verified: bool,
    /// Present only on the profile endpoint; `null` when no profile exists yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Option<ProfileResponse>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            verified: user.has_verified_email(),
            profile: None,
        }
    }
}

impl UserResponse {
    pub fn with_profile(mut self, profile: Option<ProfileResponse>) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// Identity shown next to publicly visible records.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}

/// Payload returned by register and login.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthPayload {
    pub user: UserResponse,
    pub token: String,
}
