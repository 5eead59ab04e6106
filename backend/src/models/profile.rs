//! Athlete profiles: a one-to-one extension of a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::FieldErrors;
use crate::models::photo::PhotoResponse;
use crate::models::text_enum;
use crate::types::{ProfileId, UserId};
use crate::validation::rules;

/// Advisory role tag shown on a profile. Not used for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    #[default]
    Athlete,
    Coach,
    Admin,
}

impl ProfileRole {
    pub const ALL: [ProfileRole; 3] = [
        ProfileRole::Athlete,
        ProfileRole::Coach,
        ProfileRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileRole::Athlete => "athlete",
            ProfileRole::Coach => "coach",
            ProfileRole::Admin => "admin",
        }
    }
}

text_enum!(ProfileRole);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct SocialLinks {
    #[serde(default)]
    #[validate(custom(function = "rules::validate_http_url"), length(max = 255))]
    pub strava: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub instagram: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "rules::validate_http_url"), length(max = 255))]
    pub facebook: Option<String>,
}

impl SocialLinks {
    pub fn normalized(self) -> Self {
        Self {
            strava: rules::blank_to_none(self.strava),
            instagram: rules::blank_to_none(self.instagram),
            facebook: rules::blank_to_none(self.facebook),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub role: ProfileRole,
    pub ironman_number: Option<String>,
    pub bio: Option<String>,
    pub social_links: Option<Json<SocialLinks>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: UserId, role: ProfileRole, now: DateTime<Utc>) -> Self {
        Self {
            id: ProfileId::new(),
            user_id,
            role,
            ironman_number: None,
            bio: None,
            social_links: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial profile update. Absent fields are left untouched; `null` clears a
/// nullable field.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<ProfileRole>)]
    pub role: Option<Option<String>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[validate(length(max = 50))]
    #[schema(value_type = Option<String>)]
    pub ironman_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[validate(length(max = 500))]
    #[schema(value_type = Option<String>)]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<SocialLinks>)]
    pub social_links: Option<Option<SocialLinks>>,
}

impl UpdateProfileRequest {
    /// A supplied role must be one of the known values; `null` is rejected.
    pub fn check_role(&self, errors: &mut FieldErrors) {
        match &self.role {
            Some(None) => errors.add("role", "The role field must be a string."),
            Some(Some(role)) if role.parse::<ProfileRole>().is_err() => {
                errors.add("role", "The selected role is invalid.")
            }
            _ => {}
        }
    }
}

/// Validated changes ready to be applied to a stored profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub role: Option<ProfileRole>,
    pub ironman_number: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub social_links: Option<Option<SocialLinks>>,
}

impl ProfileChanges {
    /// Builds changes from an already validated request. Blank strings are
    /// treated as `null`.
    pub fn from_request(request: UpdateProfileRequest) -> Self {
        Self {
            role: request.role.flatten().and_then(|role| role.parse().ok()),
            ironman_number: request.ironman_number.map(rules::blank_to_none),
            bio: request.bio.map(rules::blank_to_none),
            social_links: request
                .social_links
                .map(|links| links.map(SocialLinks::normalized)),
        }
    }

    pub fn apply(&self, profile: &mut Profile, now: DateTime<Utc>) {
        if let Some(role) = self.role {
            profile.role = role;
        }
        if let Some(ironman_number) = &self.ironman_number {
            profile.ironman_number = ironman_number.clone();
        }
        if let Some(bio) = &self.bio {
            profile.bio = bio.clone();
        }
        if let Some(social_links) = &self.social_links {
            profile.social_links = social_links.clone().map(Json);
        }
        profile.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub role: ProfileRole,
    pub ironman_number: Option<String>,
    pub bio: Option<String>,
    pub social_links: SocialLinks,
    pub avatar: Option<PhotoResponse>,
    pub photos: Vec<PhotoResponse>,
}

impl ProfileResponse {
    pub fn new(
        profile: &Profile,
        avatar: Option<PhotoResponse>,
        photos: Vec<PhotoResponse>,
    ) -> Self {
        Self {
            role: profile.role,
            ironman_number: profile.ironman_number.clone(),
            bio: profile.bio.clone(),
            social_links: profile
                .social_links
                .as_ref()
                .map(|links| links.0.clone())
                .unwrap_or_default(),
            avatar,
            photos,
        }
    }
}
