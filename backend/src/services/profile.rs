//! Profile updates, the photo gallery and avatar selection.

use std::sync::Arc;

use validator::Validate;

use crate::config::PhotoPolicy;
use crate::error::{collect_validation_errors, AppError, FieldErrors};
use crate::models::photo::{ImageKind, Photo, PhotoResponse, SetAvatarRequest, UploadedFile};
use crate::models::profile::{Profile, ProfileChanges, ProfileResponse, UpdateProfileRequest};
use crate::models::user::{User, UserResponse};
use crate::models::{Page, PageMeta};
use crate::repositories::{PhotoRepository, ProfileRepository};
use crate::services::blob_store::BlobStore;
use crate::types::{PhotoId, UserId};
use crate::utils::security::random_hex;
use crate::utils::Clock;

pub const PHOTO_NOT_OWNED_MESSAGE: &str = "Photo not found or does not belong to you.";
pub const PHOTO_NOT_FOUND_MESSAGE: &str = "Photo not found.";

const PHOTO_DIRECTORY: &str = "profile_photos";

#[derive(Clone)]
pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
    photos: Arc<dyn PhotoRepository>,
    blobs: Arc<dyn BlobStore>,
    policy: PhotoPolicy,
    clock: Arc<dyn Clock>,
}

impl ProfileService {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        photos: Arc<dyn PhotoRepository>,
        blobs: Arc<dyn BlobStore>,
        policy: PhotoPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles,
            photos,
            blobs,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &PhotoPolicy {
        &self.policy
    }

    pub fn photo_response(&self, photo: &Photo) -> PhotoResponse {
        PhotoResponse::new(photo, self.blobs.url(&photo.path))
    }

    async fn profile_response(&self, profile: &Profile) -> Result<ProfileResponse, AppError> {
        let photos = self.photos.all_for_user(profile.user_id).await?;
        let avatar = photos
            .iter()
            .find(|photo| photo.is_avatar)
            .map(|photo| self.photo_response(photo));
        let photos = photos.iter().map(|photo| self.photo_response(photo)).collect();
        Ok(ProfileResponse::new(profile, avatar, photos))
    }

    /// The user with their profile, which is `null` before email verification.
    pub async fn get_profile(&self, user: &User) -> Result<UserResponse, AppError> {
        let profile = match self.profiles.find_by_user(user.id).await? {
            Some(profile) => Some(self.profile_response(&profile).await?),
            None => None,
        };
        Ok(UserResponse::from(user).with_profile(profile))
    }

    pub async fn update_profile(
        &self,
        user: &User,
        mut request: UpdateProfileRequest,
    ) -> Result<UserResponse, AppError> {
        let mut errors = FieldErrors::new();
        if let Err(validation) = request.validate() {
            collect_validation_errors(&validation, None, &mut errors);
        }
        request.check_role(&mut errors);
        if let Some(Some(links)) = request.social_links.as_mut() {
            *links = std::mem::take(links).normalized();
            if let Err(validation) = links.validate() {
                collect_validation_errors(&validation, Some("social_links"), &mut errors);
            }
        }
        errors.into_result()?;

        let changes = ProfileChanges::from_request(request);
        let profile = self
            .profiles
            .upsert(user.id, &changes, self.clock.now())
            .await?;
        tracing::info!(user_id = %user.id, "Profile updated");

        let profile = self.profile_response(&profile).await?;
        Ok(UserResponse::from(user).with_profile(Some(profile)))
    }

    pub async fn list_photos(
        &self,
        user_id: UserId,
        page: i64,
        per_page: Option<i64>,
    ) -> Result<Page<PhotoResponse>, AppError> {
        let per_page = self.policy.per_page(per_page);
        let total = self.photos.count_for_user(user_id).await?;
        let meta = PageMeta::new(page.max(1), per_page, total);
        let photos = self
            .photos
            .list_for_user(user_id, per_page, meta.offset())
            .await?;
        Ok(Page {
            items: photos.iter().map(|photo| self.photo_response(photo)).collect(),
            meta,
        })
    }

    fn check_uploads(&self, files: &[UploadedFile]) -> Result<Vec<ImageKind>, AppError> {
        if files.is_empty() {
            return Err(AppError::validation("photos", "The photos field is required."));
        }
        if files.len() > self.policy.max_files_per_upload {
            return Err(AppError::validation(
                "photos",
                format!(
                    "The photos field must not have more than {} items.",
                    self.policy.max_files_per_upload
                ),
            ));
        }

        let max_kb = self.policy.max_file_bytes / 1024;
        let mut errors = FieldErrors::new();
        let mut kinds = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let key = format!("photos.{}", index);
            match ImageKind::sniff(&file.bytes) {
                Some(kind) => kinds.push(kind),
                None => errors.add(
                    key.clone(),
                    format!("The {} field must be a file of type: jpeg, png, jpg, webp.", key),
                ),
            }
            if file.bytes.len() > self.policy.max_file_bytes {
                errors.add(
                    key.clone(),
                    format!("The {} field must not be greater than {} kilobytes.", key, max_kb),
                );
            }
        }
        errors.into_result()?;
        Ok(kinds)
    }

    /// Stores every file or none. Validation happens before any blob is written.
    pub async fn upload_photos(
        &self,
        user_id: UserId,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<PhotoResponse>, AppError> {
        let kinds = self.check_uploads(&files)?;

        let mut created = Vec::with_capacity(files.len());
        for (file, kind) in files.into_iter().zip(kinds) {
            let filename = format!("{}.{}", random_hex(8), kind.extension());
            let path = format!("{}/{}/{}", PHOTO_DIRECTORY, user_id, filename);

            tracing::debug!(client_name = ?file.client_name, path = %path, "Storing photo");
            self.blobs.put(&path, &file.bytes).await?;

            let photo = Photo::new(user_id, path.clone(), filename, self.clock.now());
            let photo = match self.photos.create(&photo).await {
                Ok(photo) => photo,
                Err(err) => {
                    if let Err(cleanup) = self.blobs.delete(&path).await {
                        tracing::warn!(path = %path, error = ?cleanup, "Failed to remove orphaned blob");
                    }
                    return Err(err);
                }
            };
            created.push(self.photo_response(&photo));
        }

        tracing::info!(user_id = %user_id, count = created.len(), "Photos uploaded");
        Ok(created)
    }

    pub async fn set_avatar(
        &self,
        user_id: UserId,
        request: SetAvatarRequest,
    ) -> Result<PhotoResponse, AppError> {
        request.validate()?;

        let Ok(photo_id) = request.photo_id.trim().parse::<PhotoId>() else {
            return Err(AppError::validation("photo_id", PHOTO_NOT_OWNED_MESSAGE));
        };
        let photo = self
            .photos
            .set_avatar(user_id, photo_id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::validation("photo_id", PHOTO_NOT_OWNED_MESSAGE))?;

        tracing::info!(user_id = %user_id, photo_id = %photo.id, "Avatar changed");
        Ok(self.photo_response(&photo))
    }

    /// Someone else's photo is reported exactly like a missing one.
    pub async fn delete_photo(&self, user_id: UserId, photo_id: PhotoId) -> Result<(), AppError> {
        let Some(photo) = self.photos.find_for_user(user_id, photo_id).await? else {
            return Err(AppError::not_found("photo_id", PHOTO_NOT_FOUND_MESSAGE));
        };

        match self.blobs.delete(&photo.path).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(path = %photo.path, "Photo blob was already missing"),
            Err(err) => tracing::warn!(path = %photo.path, error = ?err, "Failed to delete photo blob"),
        }

        if !self.photos.delete_for_user(user_id, photo_id).await? {
            return Err(AppError::not_found("photo_id", PHOTO_NOT_FOUND_MESSAGE));
        }
        tracing::info!(user_id = %user_id, photo_id = %photo_id, "Photo deleted");
        Ok(())
    }
}
