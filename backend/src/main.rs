use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ironclub_backend::{
    config::Config,
    db::connection::{create_pool, DbPool},
    middleware::rate_limit::create_auth_rate_limiter,
    repositories::Repositories,
    routes,
    services::{EmailNotifier, LocalBlobStore},
    state::AppState,
    utils::{email::EmailService, SystemClock},
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => mask_secret(url),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ironclub_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_database_url(&config.database_url),
        app_url = %config.app_url,
        frontend_url = %config.frontend_url,
        app_key = %mask_secret(&config.app_key),
        storage_root = %config.storage_root,
        smtp_host = %config.smtp.host,
        smtp_password = %mask_secret(&config.smtp.password),
        smtp_skip_send = config.smtp.skip_send,
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let pool: DbPool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let notifier = Arc::new(EmailNotifier::new(EmailService::new(&config.smtp)?));
    let blobs = Arc::new(LocalBlobStore::new(
        config.storage_root.clone(),
        config.storage_public_url.clone(),
    ));
    let limiter = create_auth_rate_limiter(&config)?;
    let bind_addr: SocketAddr = config.bind_addr.parse()?;

    let state = AppState::new(
        config,
        Repositories::postgres(pool),
        notifier,
        blobs,
        Arc::new(SystemClock),
    )?;
    let app = routes::router(state, Some(limiter));

    // Start server
    tracing::info!("Server listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
