pub mod auth;
pub mod blob_store;
pub mod notifier;
pub mod profile;
pub mod race_result;
pub mod token_issuer;

pub use auth::AuthService;
pub use blob_store::{BlobStore, LocalBlobStore};
pub use notifier::{EmailNotifier, Notification, Notifier};
pub use profile::ProfileService;
pub use race_result::RaceResultService;
pub use token_issuer::TokenIssuer;
