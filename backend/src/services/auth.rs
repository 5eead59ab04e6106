//! Registration, login, email verification and password reset.

use std::sync::Arc;

use validator::Validate;

use crate::error::AppError;
use crate::models::password_reset::ResetFailure;
use crate::models::profile::{Profile, ProfileRole};
use crate::models::session::CurrentUser;
use crate::models::user::{
    normalize_email, AuthPayload, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, User, UserResponse,
};
use crate::repositories::user::EMAIL_TAKEN_MESSAGE;
use crate::repositories::{ProfileRepository, UserRepository};
use crate::services::notifier::{Notification, Notifier};
use crate::services::token_issuer::{LinkCheck, ResetIssue, TokenIssuer};
use crate::utils::{burn_password_check, hash_password, verify_password, Clock};

pub const INVALID_CREDENTIALS_MESSAGE: &str = "These credentials do not match our records.";
pub const EMAIL_NOT_VERIFIED_MESSAGE: &str =
    "Your email address is not verified. Please check your inbox or request a new verification email.";
pub const ALREADY_VERIFIED_MESSAGE: &str =
    "Your email address is already verified. There is no need to send another email.";

/// Successful login. `email_verified` is false when the advisory flag should
/// be shown.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub payload: AuthPayload,
    pub email_verified: bool,
}

/// The fixed set of results a verification link can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    AlreadyVerified,
    InvalidSignature,
    InvalidLink,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    tokens: TokenIssuer,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        tokens: TokenIssuer,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            profiles,
            tokens,
            notifier,
            clock,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthPayload, AppError> {
        request.validate()?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AppError::validation("email", EMAIL_TAKEN_MESSAGE));
        }

        let password_hash = hash_password(&request.password)?;
        let user = User::new(
            request.name.trim().to_string(),
            &request.email,
            password_hash,
            self.clock.now(),
        );
        let user = self.users.create(&user).await?;
        tracing::info!(user_id = %user.id, "User registered");

        self.send_verification(&user);

        let token = self.tokens.issue_session(&user).await?;
        Ok(AuthPayload {
            user: UserResponse::from(&user),
            token,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, AppError> {
        request.validate()?;

        let Some(user) = self.users.find_by_email(&request.email).await? else {
            burn_password_check(&request.password);
            return Err(AppError::unauthorized("email", INVALID_CREDENTIALS_MESSAGE));
        };
        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::unauthorized("email", INVALID_CREDENTIALS_MESSAGE));
        }

        let token = self.tokens.replace_sessions(&user).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome {
            email_verified: user.has_verified_email(),
            payload: AuthPayload {
                user: UserResponse::from(&user),
                token,
            },
        })
    }

    pub async fn logout(&self, current: &CurrentUser) -> Result<(), AppError> {
        self.tokens.revoke_session(&current.token_hash).await?;
        tracing::info!(user_id = %current.user.id, "User logged out");
        Ok(())
    }

    pub async fn resend_verification(&self, user: &User) -> Result<(), AppError> {
        if user.has_verified_email() {
            return Err(AppError::conflict("email", ALREADY_VERIFIED_MESSAGE));
        }
        self.send_verification(user);
        Ok(())
    }

    /// Always succeeds for a well-formed email, whether or not an account
    /// exists.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<(), AppError> {
        request.validate()?;

        let Some(user) = self.users.find_by_email(&request.email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        match self.tokens.create_password_reset_token(&user).await? {
            ResetIssue::Issued(token) => {
                let url = self.tokens.password_reset_link(&token, &user.email);
                self.notifier.dispatch(Notification::ResetPassword {
                    to: user.email.clone(),
                    url,
                    expires_in_minutes: self.tokens.policy().password_reset_ttl.num_minutes(),
                });
                tracing::info!(user_id = %user.id, "Password reset link sent");
            }
            ResetIssue::Throttled => {
                tracing::info!(user_id = %user.id, "Password reset request throttled");
            }
        }
        Ok(())
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AppError> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let user = match self
            .tokens
            .consume_password_reset_token(&email, &request.token)
            .await?
        {
            Ok(user) => user,
            Err(failure) => return Err(reset_failure_error(failure)),
        };

        let password_hash = hash_password(&request.password)?;
        self.users
            .update_password(user.id, &password_hash, self.clock.now())
            .await?;
        let revoked = self.tokens.revoke_all_sessions(user.id).await?;
        tracing::info!(user_id = %user.id, revoked, "Password reset");

        self.notifier.dispatch(Notification::PasswordChanged {
            to: user.email.clone(),
            name: user.name.clone(),
        });
        Ok(())
    }

    /// Used by the reset form page only; the API never reveals this.
    pub async fn account_exists(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.users.find_by_email(email).await?.is_some())
    }

    /// Never fails for a bad link; every problem maps to an outcome.
    pub async fn verify_email(
        &self,
        user_id: &str,
        hash: &str,
        expires: Option<i64>,
        signature: Option<&str>,
    ) -> Result<VerificationOutcome, AppError> {
        let (Some(expires), Some(signature)) = (expires, signature) else {
            return Ok(VerificationOutcome::InvalidSignature);
        };

        let user = match self
            .tokens
            .verify_link(user_id, hash, expires, signature)
            .await?
        {
            LinkCheck::Valid(user) => user,
            LinkCheck::BadSignature | LinkCheck::Expired => {
                return Ok(VerificationOutcome::InvalidSignature)
            }
            LinkCheck::UserNotFound | LinkCheck::HashMismatch => {
                return Ok(VerificationOutcome::InvalidLink)
            }
        };

        let now = self.clock.now();
        let newly_verified =
            !user.has_verified_email() && self.users.mark_email_verified(user.id, now).await?;

        // Idempotent. Also fills in a profile whose insert failed on an earlier click.
        let created = self
            .profiles
            .create_if_absent(&Profile::new(user.id, ProfileRole::Athlete, now))
            .await?;

        if !newly_verified {
            if created {
                tracing::warn!(user_id = %user.id, "Created missing profile for verified user");
            }
            return Ok(VerificationOutcome::AlreadyVerified);
        }
        tracing::info!(user_id = %user.id, profile_created = created, "Email verified");
        Ok(VerificationOutcome::Verified)
    }

    fn send_verification(&self, user: &User) {
        self.notifier.dispatch(Notification::VerifyEmail {
            to: user.email.clone(),
            name: user.name.clone(),
            url: self.tokens.verification_link(user),
        });
    }
}

fn reset_failure_error(failure: ResetFailure) -> AppError {
    match failure {
        ResetFailure::Throttled => AppError::rate_limited(failure.field(), failure.message()),
        ResetFailure::InvalidToken | ResetFailure::InvalidUser => {
            AppError::validation(failure.field(), failure.message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenPolicy;
    use crate::repositories::password_reset::MockPasswordResetRepository;
    use crate::repositories::profile::MockProfileRepository;
    use crate::repositories::session::MockSessionRepository;
    use crate::repositories::user::MockUserRepository;
    use crate::utils::signed_url::UrlSigner;
    use crate::utils::SystemClock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<Notification>>);

    impl Notifier for Outbox {
        fn dispatch(&self, notification: Notification) {
            self.0.lock().unwrap().push(notification);
        }
    }

    fn service(
        users: MockUserRepository,
        sessions: MockSessionRepository,
        profiles: MockProfileRepository,
        outbox: Arc<Outbox>,
    ) -> AuthService {
        let users: Arc<dyn UserRepository> = Arc::new(users);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let tokens = TokenIssuer::new(
            users.clone(),
            Arc::new(sessions),
            Arc::new(MockPasswordResetRepository::new()),
            UrlSigner::new("test-key").unwrap(),
            TokenPolicy::default(),
            "http://app.test",
            "http://front.test",
            clock.clone(),
        );
        AuthService::new(users, Arc::new(profiles), tokens, outbox, clock)
    }

    fn verified_user() -> User {
        let mut user = User::new(
            "Chrissie".into(),
            "chrissie@example.com",
            hash_password("password123").unwrap(),
            chrono::Utc::now(),
        );
        user.email_verified_at = Some(chrono::Utc::now());
        user
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_generic_unauthorized() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        let auth = service(
            users,
            MockSessionRepository::new(),
            MockProfileRepository::new(),
            Arc::default(),
        );

        let err = auth
            .login(LoginRequest {
                email: "nobody@example.com".into(),
                password: "password123".into(),
            })
            .await
            .unwrap_err();
        match err {
            AppError::Unauthorized(fields) => {
                assert_eq!(fields.get("email").unwrap()[0], INVALID_CREDENTIALS_MESSAGE)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_with_wrong_password_uses_same_message_and_keeps_sessions() {
        let user = verified_user();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
        let mut sessions = MockSessionRepository::new();
        sessions.expect_replace_for_user().never();
        let auth = service(users, sessions, MockProfileRepository::new(), Arc::default());

        let err = auth
            .login(LoginRequest {
                email: "chrissie@example.com".into(),
                password: "wrong-password".into(),
            })
            .await
            .unwrap_err();
        match err {
            AppError::Unauthorized(fields) => {
                assert_eq!(fields.get("email").unwrap()[0], INVALID_CREDENTIALS_MESSAGE)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_replaces_previous_sessions() {
        let user = verified_user();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_replace_for_user()
            .times(1)
            .returning(|_| Ok(2));
        let auth = service(users, sessions, MockProfileRepository::new(), Arc::default());

        let outcome = auth
            .login(LoginRequest {
                email: "chrissie@example.com".into(),
                password: "password123".into(),
            })
            .await
            .unwrap();
        assert!(outcome.email_verified);
        assert_eq!(outcome.payload.token.len(), 40);
    }

    #[tokio::test]
    async fn resend_is_refused_once_verified() {
        let outbox = Arc::new(Outbox::default());
        let auth = service(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            MockProfileRepository::new(),
            outbox.clone(),
        );

        let err = auth.resend_verification(&verified_user()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(outbox.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_email_without_signature_is_rejected_without_lookups() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().never();
        let auth = service(
            users,
            MockSessionRepository::new(),
            MockProfileRepository::new(),
            Arc::default(),
        );

        let outcome = auth
            .verify_email("not-a-uuid", "hash", Some(0), None)
            .await
            .unwrap();
        assert_eq!(outcome, VerificationOutcome::InvalidSignature);
    }

    #[tokio::test]
    async fn verification_retry_creates_profile_after_failed_insert() {
        let user = Arc::new(Mutex::new(User::new(
            "Chrissie".into(),
            "chrissie@example.com",
            hash_password("password123").unwrap(),
            chrono::Utc::now(),
        )));

        let mut users = MockUserRepository::new();
        let stored = user.clone();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.lock().unwrap().clone())));
        let stored = user.clone();
        users
            .expect_mark_email_verified()
            .times(1)
            .returning(move |_, at| {
                stored.lock().unwrap().email_verified_at = Some(at);
                Ok(true)
            });

        let attempts = Arc::new(AtomicUsize::new(0));
        let mut profiles = MockProfileRepository::new();
        let counter = attempts.clone();
        profiles
            .expect_create_if_absent()
            .times(2)
            .returning(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::Internal(anyhow::anyhow!("connection reset")))
                } else {
                    Ok(true)
                }
            });
        let auth = service(users, MockSessionRepository::new(), profiles, Arc::default());

        let link = auth.tokens.verification_link(&user.lock().unwrap());
        let link = url::Url::parse(&link).unwrap();
        let segments: Vec<String> = link.path_segments().unwrap().map(str::to_owned).collect();
        let query: HashMap<String, String> = link.query_pairs().into_owned().collect();
        let expires = query["expires"].parse::<i64>().ok();
        let signature = query["signature"].as_str();

        let first = auth
            .verify_email(&segments[1], &segments[2], expires, Some(signature))
            .await;
        assert!(matches!(first, Err(AppError::Internal(_))));
        assert!(user.lock().unwrap().has_verified_email());

        let second = auth
            .verify_email(&segments[1], &segments[2], expires, Some(signature))
            .await
            .unwrap();
        assert_eq!(second, VerificationOutcome::AlreadyVerified);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn throttled_reset_maps_to_rate_limited() {
        let err = reset_failure_error(ResetFailure::Throttled);
        match err {
            AppError::RateLimited(fields) => assert_eq!(
                fields.get("email").unwrap()[0],
                "Too many attempts. Please try again later."
            ),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(matches!(
            reset_failure_error(ResetFailure::InvalidToken),
            AppError::Validation(_)
        ));
    }
}
