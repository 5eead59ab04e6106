use ironclub_backend::{
    config::Config,
    db::connection::create_pool,
    repositories::{password_reset::PgPasswordResetRepository, PasswordResetRepository},
    utils::{Clock, SystemClock},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_cleanup=info,ironclub_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url, 1).await?;

    let cutoff = SystemClock.now() - config.tokens.password_reset_ttl;
    let deleted_count = PgPasswordResetRepository::new(pool.clone())
        .delete_expired(cutoff)
        .await
        .map_err(|err| anyhow::anyhow!("cleanup expired password reset tokens: {}", err))?;

    if deleted_count > 0 {
        tracing::info!("Deleted {} expired password reset tokens", deleted_count);
    } else {
        tracing::debug!("No expired password reset tokens");
    }

    sqlx::query("VACUUM (ANALYZE) password_reset_tokens")
        .execute(&pool)
        .await?;

    Ok(())
}
