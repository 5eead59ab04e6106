#![allow(dead_code)]

use std::{
    collections::HashMap,
    env,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use ironclub_backend::{
    config::Config,
    error::AppError,
    models::{
        password_reset::PasswordResetToken,
        photo::Photo,
        profile::{Profile, ProfileChanges},
        race_result::RaceResult,
        session::SessionToken,
        user::{normalize_email, User},
    },
    repositories::{
        user::EMAIL_TAKEN_MESSAGE, PasswordResetRepository, PhotoRepository, ProfileRepository,
        RaceResultRepository, Repositories, SessionRepository, UserRepository,
    },
    routes,
    services::{BlobStore, Notification, Notifier},
    state::AppState,
    types::{PhotoId, RaceResultId, SessionTokenId, UserId},
    utils::Clock,
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

/// Clock that only moves when told to.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
            .single()
            .expect("valid start time");
        Self(Mutex::new(start))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Keeps every notification instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier(Mutex<Vec<Notification>>);

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.all().iter().filter(|n| n.kind() == kind).count()
    }

    pub fn last_verification_url(&self) -> Option<String> {
        self.all().into_iter().rev().find_map(|n| match n {
            Notification::VerifyEmail { url, .. } => Some(url),
            _ => None,
        })
    }

    pub fn last_reset_url(&self) -> Option<String> {
        self.all().into_iter().rev().find_map(|n| match n {
            Notification::ResetPassword { url, .. } => Some(url),
            _ => None,
        })
    }
}

impl Notifier for RecordingNotifier {
    fn dispatch(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct MemoryBlobStore(Mutex<HashMap<String, Vec<u8>>>);

impl MemoryBlobStore {
    pub fn contains(&self, path: &str) -> bool {
        self.0.lock().unwrap().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.0
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> anyhow::Result<bool> {
        Ok(self.0.lock().unwrap().remove(path).is_some())
    }

    fn url(&self, path: &str) -> String {
        format!("http://localhost:3000/storage/{}", path)
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<SessionToken>,
    resets: Vec<PasswordResetToken>,
    profiles: Vec<Profile>,
    photos: Vec<Photo>,
    race_results: Vec<RaceResult>,
}

/// Every repository trait over one set of in-memory tables.
#[derive(Default)]
pub struct MemoryDb(Mutex<Tables>);

impl MemoryDb {
    pub fn user_count(&self) -> usize {
        self.0.lock().unwrap().users.len()
    }

    pub fn profile_count(&self) -> usize {
        self.0.lock().unwrap().profiles.len()
    }

    pub fn sessions_for(&self, user_id: UserId) -> usize {
        self.0
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .count()
    }

    pub fn user(&self, user_id: UserId) -> Option<User> {
        self.0
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
    }

    pub fn photos_for(&self, user_id: UserId) -> Vec<Photo> {
        self.0
            .lock()
            .unwrap()
            .photos
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn reset_for(&self, email: &str) -> Option<PasswordResetToken> {
        self.0
            .lock()
            .unwrap()
            .resets
            .iter()
            .find(|r| r.email == email)
            .cloned()
    }

    pub fn insert_race_result(&self, result: RaceResult) {
        self.0.lock().unwrap().race_results.push(result);
    }

    pub fn race_result(&self, id: RaceResultId) -> Option<RaceResult> {
        self.0
            .lock()
            .unwrap()
            .race_results
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }
}

fn sorted_results(mut results: Vec<RaceResult>) -> Vec<RaceResult> {
    results.sort_by(|a, b| {
        b.race_date
            .cmp(&a.race_date)
            .then(b.created_at.cmp(&a.created_at))
    });
    results
}

#[async_trait]
impl UserRepository for MemoryDb {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError> {
        Ok(self.user(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = normalize_email(email);
        let tables = self.0.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: &User) -> Result<User, AppError> {
        let mut tables = self.0.lock().unwrap();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::validation("email", EMAIL_TAKEN_MESSAGE));
        }
        tables.users.push(user.clone());
        Ok(user.clone())
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tables = self.0.lock().unwrap();
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = now;
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: UserId, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.0.lock().unwrap();
        match tables.users.iter_mut().find(|u| u.id == id) {
            Some(user) if user.email_verified_at.is_none() => {
                user.email_verified_at = Some(at);
                user.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl SessionRepository for MemoryDb {
    async fn create(&self, session: &SessionToken) -> Result<(), AppError> {
        self.0.lock().unwrap().sessions.push(session.clone());
        Ok(())
    }

    async fn replace_for_user(&self, session: &SessionToken) -> Result<u64, AppError> {
        let mut tables = self.0.lock().unwrap();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.user_id != session.user_id);
        let revoked = (before - tables.sessions.len()) as u64;
        tables.sessions.push(session.clone());
        Ok(revoked)
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<SessionToken>, AppError> {
        let tables = self.0.lock().unwrap();
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn touch(&self, id: SessionTokenId, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut tables = self.0.lock().unwrap();
        if let Some(session) = tables.sessions.iter_mut().find(|s| s.id == id) {
            session.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool, AppError> {
        let mut tables = self.0.lock().unwrap();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.token_hash != token_hash);
        Ok(tables.sessions.len() < before)
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, AppError> {
        let mut tables = self.0.lock().unwrap();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn count_for_user(&self, user_id: UserId) -> Result<i64, AppError> {
        Ok(self.sessions_for(user_id) as i64)
    }
}

#[async_trait]
impl PasswordResetRepository for MemoryDb {
    async fn find_by_email(&self, email: &str) -> Result<Option<PasswordResetToken>, AppError> {
        Ok(self.reset_for(email))
    }

    async fn issue(
        &self,
        record: &PasswordResetToken,
        throttle_cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.0.lock().unwrap();
        match tables.resets.iter_mut().find(|r| r.email == record.email) {
            Some(existing) if existing.created_at > throttle_cutoff => Ok(false),
            Some(existing) => {
                *existing = PasswordResetToken {
                    failed_attempts: 0,
                    ..record.clone()
                };
                Ok(true)
            }
            None => {
                tables.resets.push(PasswordResetToken {
                    failed_attempts: 0,
                    ..record.clone()
                });
                Ok(true)
            }
        }
    }

    async fn record_failed_attempt(&self, email: &str) -> Result<(), AppError> {
        let mut tables = self.0.lock().unwrap();
        if let Some(record) = tables.resets.iter_mut().find(|r| r.email == email) {
            record.failed_attempts += 1;
        }
        Ok(())
    }

    async fn consume(
        &self,
        email: &str,
        token_hash: &str,
        created_after: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.0.lock().unwrap();
        let before = tables.resets.len();
        tables.resets.retain(|r| {
            !(r.email == email && r.token_hash == token_hash && r.created_at > created_after)
        });
        Ok(tables.resets.len() < before)
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tables = self.0.lock().unwrap();
        let count = tables.resets.len();
        tables.resets.retain(|r| r.created_at >= before);
        Ok((count - tables.resets.len()) as u64)
    }
}

#[async_trait]
impl ProfileRepository for MemoryDb {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Profile>, AppError> {
        let tables = self.0.lock().unwrap();
        Ok(tables
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn create_if_absent(&self, profile: &Profile) -> Result<bool, AppError> {
        let mut tables = self.0.lock().unwrap();
        if tables.profiles.iter().any(|p| p.user_id == profile.user_id) {
            return Ok(false);
        }
        tables.profiles.push(profile.clone());
        Ok(true)
    }

    async fn upsert(
        &self,
        user_id: UserId,
        changes: &ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<Profile, AppError> {
        let mut tables = self.0.lock().unwrap();
        if !tables.profiles.iter().any(|p| p.user_id == user_id) {
            tables
                .profiles
                .push(Profile::new(user_id, Default::default(), now));
        }
        let profile = tables
            .profiles
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("profile vanished")))?;
        changes.apply(profile, now);
        Ok(profile.clone())
    }
}

#[async_trait]
impl PhotoRepository for MemoryDb {
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Photo>, AppError> {
        let photos = self.all_for_user(user_id).await?;
        Ok(photos
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn all_for_user(&self, user_id: UserId) -> Result<Vec<Photo>, AppError> {
        let mut photos = self.photos_for(user_id);
        photos.reverse();
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(photos)
    }

    async fn count_for_user(&self, user_id: UserId) -> Result<i64, AppError> {
        Ok(self.photos_for(user_id).len() as i64)
    }

    async fn find_for_user(
        &self,
        user_id: UserId,
        id: PhotoId,
    ) -> Result<Option<Photo>, AppError> {
        Ok(self
            .photos_for(user_id)
            .into_iter()
            .find(|p| p.id == id))
    }

    async fn find_avatar(&self, user_id: UserId) -> Result<Option<Photo>, AppError> {
        Ok(self
            .photos_for(user_id)
            .into_iter()
            .find(|p| p.is_avatar))
    }

    async fn create(&self, photo: &Photo) -> Result<Photo, AppError> {
        self.0.lock().unwrap().photos.push(photo.clone());
        Ok(photo.clone())
    }

    async fn set_avatar(
        &self,
        user_id: UserId,
        id: PhotoId,
        now: DateTime<Utc>,
    ) -> Result<Option<Photo>, AppError> {
        let mut tables = self.0.lock().unwrap();
        if !tables
            .photos
            .iter()
            .any(|p| p.user_id == user_id && p.id == id)
        {
            return Ok(None);
        }
        let mut chosen = None;
        for photo in tables.photos.iter_mut().filter(|p| p.user_id == user_id) {
            let is_avatar = photo.id == id;
            if photo.is_avatar != is_avatar {
                photo.is_avatar = is_avatar;
                photo.updated_at = now;
            }
            if is_avatar {
                chosen = Some(photo.clone());
            }
        }
        Ok(chosen)
    }

    async fn delete_for_user(&self, user_id: UserId, id: PhotoId) -> Result<bool, AppError> {
        let mut tables = self.0.lock().unwrap();
        let before = tables.photos.len();
        tables
            .photos
            .retain(|p| !(p.user_id == user_id && p.id == id));
        Ok(tables.photos.len() < before)
    }
}

#[async_trait]
impl RaceResultRepository for MemoryDb {
    async fn list_page(&self, limit: i64, offset: i64) -> Result<Vec<RaceResult>, AppError> {
        let results = self.0.lock().unwrap().race_results.clone();
        Ok(sorted_results(results)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        Ok(self.0.lock().unwrap().race_results.len() as i64)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<RaceResult>, AppError> {
        let results = self
            .0
            .lock()
            .unwrap()
            .race_results
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_results(results))
    }

    async fn find_by_id(&self, id: RaceResultId) -> Result<Option<RaceResult>, AppError> {
        Ok(self.race_result(id))
    }

    async fn create(&self, result: &RaceResult) -> Result<RaceResult, AppError> {
        self.insert_race_result(result.clone());
        Ok(result.clone())
    }

    async fn update(&self, result: &RaceResult) -> Result<RaceResult, AppError> {
        let mut tables = self.0.lock().unwrap();
        let stored = tables
            .race_results
            .iter_mut()
            .find(|r| r.id == result.id)
            .ok_or_else(|| AppError::not_found("race_result", "Race result not found."))?;
        *stored = result.clone();
        Ok(result.clone())
    }

    async fn delete(&self, id: RaceResultId) -> Result<bool, AppError> {
        let mut tables = self.0.lock().unwrap();
        let before = tables.race_results.len();
        tables.race_results.retain(|r| r.id != id);
        Ok(tables.race_results.len() < before)
    }
}

pub fn test_config() -> Config {
    Config {
        app_key: "test-app-key-for-signed-links".to_string(),
        ..Config::default()
    }
}

/// The real router over in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub db: Arc<MemoryDb>,
    pub notifier: Arc<RecordingNotifier>,
    pub blobs: Arc<MemoryBlobStore>,
    pub clock: Arc<FixedClock>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// A registered account together with its bearer token.
pub struct Account {
    pub id: UserId,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let db = Arc::new(MemoryDb::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let blobs = Arc::new(MemoryBlobStore::default());
        let clock = Arc::new(FixedClock::new());
        let repositories = Repositories {
            users: db.clone(),
            sessions: db.clone(),
            password_resets: db.clone(),
            profiles: db.clone(),
            photos: db.clone(),
            race_results: db.clone(),
        };
        let state = AppState::new(
            config,
            repositories,
            notifier.clone(),
            blobs.clone(),
            clock.clone(),
        )
        .expect("build state");
        let router = routes::router(state.clone(), None);
        Self {
            router,
            state,
            db,
            notifier,
            blobs,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::DELETE, uri, token, None).await
    }

    pub async fn register(&self, name: &str, email: &str) -> Account {
        let response = self
            .post(
                "/api/v1/auth/register",
                None,
                serde_json::json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "password_confirmation": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        let json = response.json();
        Account {
            id: json["data"]["user"]["id"]
                .as_str()
                .and_then(|id| id.parse().ok())
                .expect("user id"),
            email: json["data"]["user"]["email"]
                .as_str()
                .expect("email")
                .to_string(),
            token: json["data"]["token"].as_str().expect("token").to_string(),
        }
    }

    /// Follows the most recent verification link sent by mail.
    pub async fn follow_verification_link(&self) -> TestResponse {
        let link = self
            .notifier
            .last_verification_url()
            .expect("verification link sent");
        self.get(&path_and_query(&link), None).await
    }

    pub async fn register_verified(&self, name: &str, email: &str) -> Account {
        let account = self.register(name, email).await;
        let response = self.follow_verification_link().await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        account
    }

    /// Multipart upload of `files` as repeated `photos[]` parts.
    pub async fn upload(&self, token: &str, files: &[(&str, Vec<u8>)]) -> TestResponse {
        let boundary = "ironclub-test-boundary";
        let mut body = Vec::new();
        for (name, bytes) in files {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"photos[]\"; filename=\"{}\"\r\n",
                    name
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/user/photos")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .expect("build upload request");
        self.send(request).await
    }
}

/// Strips scheme and host so a mailed link can be replayed against the router.
pub fn path_and_query(link: &str) -> String {
    let url = url::Url::parse(link).expect("absolute link");
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

pub fn query_param(link: &str, name: &str) -> Option<String> {
    let url = url::Url::parse(link).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

pub fn race_result_json(race_date: &str, location: &str) -> Value {
    serde_json::json!({
        "race_date": race_date,
        "location": location,
        "race_type": "ironman",
        "swim_time": 3900,
        "t1_time": 240,
        "bike_time": 19800,
        "t2_time": 180,
        "run_time": 14400,
        "total_time": 38520,
        "age_group": "M35-39",
        "overall_position": 120,
        "age_group_position": 14
    })
}

/// Connects to `TEST_DATABASE_URL` and applies the migrations, or returns
/// `None` so the caller can skip.
pub async fn test_pool() -> Option<PgPool> {
    let url = env::var("TEST_DATABASE_URL").ok()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}
