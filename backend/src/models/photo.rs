//! Profile photos and the avatar flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{PhotoId, UserId};
use crate::validation::rules;

#[derive(Debug, Clone, FromRow)]
pub struct Photo {
    pub id: PhotoId,
    pub user_id: UserId,
    /// Blob store key, `profile_photos/{user_id}/{name}.{ext}`.
    pub path: String,
    pub filename: String,
    /// At most one photo per user carries the flag.
    pub is_avatar: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(user_id: UserId, path: String, filename: String, now: DateTime<Utc>) -> Self {
        Self {
            id: PhotoId::new(),
            user_id,
            path,
            filename,
            is_avatar: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Image formats accepted for upload, detected from the file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
        }
    }
}

/// A file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub client_name: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PhotoResponse {
    pub id: PhotoId,
    pub url: String,
    pub filename: String,
    pub is_avatar: bool,
    pub created_at: DateTime<Utc>,
}

impl PhotoResponse {
    pub fn new(photo: &Photo, url: String) -> Self {
        Self {
            id: photo.id,
            url,
            filename: photo.filename.clone(),
            is_avatar: photo.is_avatar,
            created_at: photo.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct SetAvatarRequest {
    #[validate(custom(function = "rules::validate_required"))]
    pub photo_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadedPhotos {
    pub photos: Vec<PhotoResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvatarPayload {
    pub avatar: PhotoResponse,
}
