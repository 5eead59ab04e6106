use std::sync::Arc;

use crate::config::Config;
use crate::repositories::Repositories;
use crate::services::{
    AuthService, BlobStore, Notifier, ProfileService, RaceResultService, TokenIssuer,
};
use crate::utils::signed_url::UrlSigner;
use crate::utils::Clock;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenIssuer,
    pub auth: AuthService,
    pub profiles: ProfileService,
    pub race_results: RaceResultService,
}

impl AppState {
    /// Wires the services over the given stores and collaborators.
    pub fn new(
        config: Config,
        repositories: Repositories,
        notifier: Arc<dyn Notifier>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let signer = UrlSigner::new(&config.app_key)?;
        let tokens = TokenIssuer::new(
            repositories.users.clone(),
            repositories.sessions.clone(),
            repositories.password_resets.clone(),
            signer,
            config.tokens.clone(),
            config.app_url.clone(),
            config.frontend_url.clone(),
            clock.clone(),
        );
        let auth = AuthService::new(
            repositories.users.clone(),
            repositories.profiles.clone(),
            tokens.clone(),
            notifier,
            clock.clone(),
        );
        let profiles = ProfileService::new(
            repositories.profiles.clone(),
            repositories.photos.clone(),
            blobs,
            config.photos.clone(),
            clock.clone(),
        );
        let race_results = RaceResultService::new(
            repositories.race_results.clone(),
            repositories.users.clone(),
            config.race_results_per_page,
            clock,
        );

        Ok(Self {
            config: Arc::new(config),
            tokens,
            auth,
            profiles,
            race_results,
        })
    }
}
