//! Data access. Each store is a trait with a PostgreSQL implementation so the
//! services can be exercised against in-memory or mocked stores.

use std::sync::Arc;

use sqlx::PgPool;

pub mod password_reset;
pub mod photo;
pub mod profile;
pub mod race_result;
pub mod session;
pub mod transaction;
pub mod user;

pub use password_reset::{PasswordResetRepository, PgPasswordResetRepository};
pub use photo::{PgPhotoRepository, PhotoRepository};
pub use profile::{PgProfileRepository, ProfileRepository};
pub use race_result::{PgRaceResultRepository, RaceResultRepository};
pub use session::{PgSessionRepository, SessionRepository};
pub use transaction::*;
pub use user::{PgUserRepository, UserRepository};

/// The full set of stores the services depend on.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub password_resets: Arc<dyn PasswordResetRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub photos: Arc<dyn PhotoRepository>,
    pub race_results: Arc<dyn RaceResultRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            password_resets: Arc::new(PgPasswordResetRepository::new(pool.clone())),
            profiles: Arc::new(PgProfileRepository::new(pool.clone())),
            photos: Arc::new(PgPhotoRepository::new(pool.clone())),
            race_results: Arc::new(PgRaceResultRepository::new(pool)),
        }
    }
}
