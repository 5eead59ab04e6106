use anyhow::anyhow;
use chrono::Duration;
use std::env;
use std::str::FromStr;

/// Lifetimes and limits for reset tokens and verification links.
#[derive(Debug, Clone)]
pub struct TokenPolicy {
    pub password_reset_ttl: Duration,
    pub password_reset_throttle: Duration,
    pub password_reset_max_attempts: i32,
    pub verification_ttl: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            password_reset_ttl: Duration::minutes(60),
            password_reset_throttle: Duration::seconds(60),
            password_reset_max_attempts: 5,
            verification_ttl: Duration::minutes(60),
        }
    }
}

/// Pagination bounds and upload limits for the photo gallery.
#[derive(Debug, Clone)]
pub struct PhotoPolicy {
    pub default_per_page: i64,
    pub max_per_page: i64,
    pub max_file_bytes: usize,
    pub max_files_per_upload: usize,
}

impl Default for PhotoPolicy {
    fn default() -> Self {
        Self {
            default_per_page: 15,
            max_per_page: 50,
            max_file_bytes: 5120 * 1024,
            max_files_per_upload: 10,
        }
    }
}

impl PhotoPolicy {
    /// Clamps a caller supplied page size into `1..=max_per_page`.
    pub fn per_page(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_per_page)
            .clamp(1, self.max_per_page.max(1))
    }

    /// Upper bound for a multipart upload body, with headroom for the
    /// multipart framing.
    pub fn upload_body_limit(&self) -> usize {
        self.max_file_bytes
            .saturating_mul(self.max_files_per_upload)
            .saturating_add(1024 * 1024)
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub skip_send: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "noreply@ironclub.local".into(),
            skip_send: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub app_url: String,
    pub frontend_url: String,
    pub app_key: String,
    pub cors_allow_origins: Vec<String>,
    pub storage_root: String,
    pub storage_public_url: String,
    pub tokens: TokenPolicy,
    pub photos: PhotoPolicy,
    pub race_results_per_page: i64,
    pub rate_limit_auth_max_requests: u32,
    pub rate_limit_auth_window_seconds: u64,
    pub smtp: SmtpConfig,
}

/// Development defaults, matching what `Config::load` uses for unset variables.
impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/ironclub".into(),
            database_max_connections: 10,
            bind_addr: "0.0.0.0:3000".into(),
            app_url: "http://localhost:3000".into(),
            frontend_url: "http://localhost:3000".into(),
            app_key: "ironclub-development-key-change-this".into(),
            cors_allow_origins: vec!["*".into()],
            storage_root: "./storage/public".into(),
            storage_public_url: "http://localhost:3000/storage".into(),
            tokens: TokenPolicy::default(),
            photos: PhotoPolicy::default(),
            race_results_per_page: 15,
            rate_limit_auth_max_requests: 10,
            rate_limit_auth_window_seconds: 60,
            smtp: SmtpConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/ironclub".to_string());
        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", 10);
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let app_url = trim_url(
            env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        );
        let frontend_url = trim_url(
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        );

        let app_key = env::var("APP_KEY")
            .unwrap_or_else(|_| "ironclub-development-key-change-this".to_string());
        if app_key.trim().is_empty() {
            return Err(anyhow!("APP_KEY must not be empty"));
        }

        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let storage_root =
            env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage/public".to_string());
        let storage_public_url = trim_url(
            env::var("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000/storage".to_string()),
        );

        let token_defaults = TokenPolicy::default();
        let tokens = TokenPolicy {
            password_reset_ttl: Duration::minutes(parse_env(
                "PASSWORD_RESET_TTL_MINUTES",
                token_defaults.password_reset_ttl.num_minutes(),
            )),
            password_reset_throttle: Duration::seconds(parse_env(
                "PASSWORD_RESET_THROTTLE_SECONDS",
                token_defaults.password_reset_throttle.num_seconds(),
            )),
            password_reset_max_attempts: parse_env(
                "PASSWORD_RESET_MAX_ATTEMPTS",
                token_defaults.password_reset_max_attempts,
            ),
            verification_ttl: Duration::minutes(parse_env(
                "VERIFICATION_TTL_MINUTES",
                token_defaults.verification_ttl.num_minutes(),
            )),
        };

        let photo_defaults = PhotoPolicy::default();
        let photos = PhotoPolicy {
            default_per_page: parse_env("PHOTOS_DEFAULT_PER_PAGE", photo_defaults.default_per_page),
            max_per_page: parse_env("PHOTOS_MAX_PER_PAGE", photo_defaults.max_per_page),
            max_file_bytes: parse_env("PHOTO_MAX_BYTES", photo_defaults.max_file_bytes),
            max_files_per_upload: parse_env(
                "PHOTO_MAX_FILES",
                photo_defaults.max_files_per_upload,
            ),
        };

        let race_results_per_page = parse_env("RACE_RESULTS_PER_PAGE", 15i64).max(1);
        let rate_limit_auth_max_requests = parse_env("RATE_LIMIT_AUTH_MAX_REQUESTS", 10);
        let rate_limit_auth_window_seconds = parse_env("RATE_LIMIT_AUTH_WINDOW_SECONDS", 60);

        let smtp_defaults = SmtpConfig::default();
        let smtp = SmtpConfig {
            host: env::var("SMTP_HOST").unwrap_or(smtp_defaults.host),
            port: parse_env("SMTP_PORT", smtp_defaults.port),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_address: env::var("SMTP_FROM_ADDRESS").unwrap_or(smtp_defaults.from_address),
            skip_send: env::var("SMTP_SKIP_SEND").unwrap_or_default() == "true",
        };

        Ok(Config {
            database_url,
            database_max_connections,
            bind_addr,
            app_url,
            frontend_url,
            app_key,
            cors_allow_origins,
            storage_root,
            storage_public_url,
            tokens,
            photos,
            race_results_per_page,
            rate_limit_auth_max_requests,
            rate_limit_auth_window_seconds,
            smtp,
        })
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
