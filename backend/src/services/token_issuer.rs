//! Bearer sessions, password reset tokens and signed verification links.

use std::sync::Arc;

use crate::config::TokenPolicy;
use crate::error::AppError;
use crate::models::password_reset::{PasswordResetToken, ResetFailure};
use crate::models::session::{CurrentUser, SessionToken, AUTH_TOKEN_NAME};
use crate::models::user::User;
use crate::repositories::{PasswordResetRepository, SessionRepository, UserRepository};
use crate::types::UserId;
use crate::utils::security::{
    constant_time_eq, email_verification_hash, generate_token, hash_token, RESET_TOKEN_LENGTH,
    SESSION_TOKEN_LENGTH,
};
use crate::utils::signed_url::{verification_payload, SignatureCheck, UrlSigner};
use crate::utils::Clock;

/// Result of asking for a new reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetIssue {
    Issued(String),
    Throttled,
}

/// Result of checking a verification link.
#[derive(Debug, Clone)]
pub enum LinkCheck {
    Valid(User),
    BadSignature,
    Expired,
    UserNotFound,
    HashMismatch,
}

#[derive(Clone)]
pub struct TokenIssuer {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    resets: Arc<dyn PasswordResetRepository>,
    signer: UrlSigner,
    policy: TokenPolicy,
    app_url: String,
    frontend_url: String,
    clock: Arc<dyn Clock>,
}

#[allow(clippy::too_many_arguments)]
impl TokenIssuer {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        resets: Arc<dyn PasswordResetRepository>,
        signer: UrlSigner,
        policy: TokenPolicy,
        app_url: impl Into<String>,
        frontend_url: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            sessions,
            resets,
            signer,
            policy,
            app_url: app_url.into(),
            frontend_url: frontend_url.into(),
            clock,
        }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    fn new_session(&self, user: &User) -> (String, SessionToken) {
        let token = generate_token(SESSION_TOKEN_LENGTH);
        let session = SessionToken::new(
            user.id,
            AUTH_TOKEN_NAME,
            hash_token(&token),
            self.clock.now(),
        );
        (token, session)
    }

    /// Issues an additional session token for `user`.
    pub async fn issue_session(&self, user: &User) -> Result<String, AppError> {
        let (token, session) = self.new_session(user);
        self.sessions.create(&session).await?;
        Ok(token)
    }

    /// Revokes every existing session of `user` and issues a fresh one.
    pub async fn replace_sessions(&self, user: &User) -> Result<String, AppError> {
        let (token, session) = self.new_session(user);
        let revoked = self.sessions.replace_for_user(&session).await?;
        tracing::debug!(user_id = %user.id, revoked, "Replaced session tokens");
        Ok(token)
    }

    pub async fn revoke_all_sessions(&self, user_id: UserId) -> Result<u64, AppError> {
        self.sessions.delete_for_user(user_id).await
    }

    /// Deleting an unknown token is not an error.
    pub async fn revoke_session(&self, token_hash: &str) -> Result<(), AppError> {
        self.sessions.delete_by_token_hash(token_hash).await?;
        Ok(())
    }

    /// Resolves a bearer token to its user, recording the use.
    pub async fn authenticate(&self, token: &str) -> Result<Option<CurrentUser>, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let token_hash = hash_token(token);
        let Some(session) = self.sessions.find_by_token_hash(&token_hash).await? else {
            return Ok(None);
        };
        let Some(user) = self.users.find_by_id(session.user_id).await? else {
            return Ok(None);
        };
        self.sessions.touch(session.id, self.clock.now()).await?;
        Ok(Some(CurrentUser { user, token_hash }))
    }

    /// Creates a reset token for `user`, unless one was issued within the
    /// throttle window.
    pub async fn create_password_reset_token(&self, user: &User) -> Result<ResetIssue, AppError> {
        let now = self.clock.now();
        let token = generate_token(RESET_TOKEN_LENGTH);
        let record = PasswordResetToken {
            email: user.email.clone(),
            token_hash: hash_token(&token),
            failed_attempts: 0,
            created_at: now,
        };
        let cutoff = now - self.policy.password_reset_throttle;
        if self.resets.issue(&record, cutoff).await? {
            Ok(ResetIssue::Issued(token))
        } else {
            Ok(ResetIssue::Throttled)
        }
    }

    /// Checks `token` for `email` and deletes it on success. A token can be
    /// consumed at most once.
    pub async fn consume_password_reset_token(
        &self,
        email: &str,
        token: &str,
    ) -> Result<Result<User, ResetFailure>, AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(Err(ResetFailure::InvalidUser));
        };
        let Some(record) = self.resets.find_by_email(&user.email).await? else {
            return Ok(Err(ResetFailure::InvalidToken));
        };

        let now = self.clock.now();
        if record.is_expired(self.policy.password_reset_ttl, now) {
            return Ok(Err(ResetFailure::InvalidToken));
        }
        if record.failed_attempts >= self.policy.password_reset_max_attempts {
            return Ok(Err(ResetFailure::Throttled));
        }

        let token_hash = hash_token(token);
        if !constant_time_eq(&token_hash, &record.token_hash) {
            self.resets.record_failed_attempt(&record.email).await?;
            return Ok(Err(ResetFailure::InvalidToken));
        }

        let created_after = now - self.policy.password_reset_ttl;
        if !self
            .resets
            .consume(&record.email, &token_hash, created_after)
            .await?
        {
            return Ok(Err(ResetFailure::InvalidToken));
        }
        Ok(Ok(user))
    }

    /// Link sent by mail for choosing a new password.
    pub fn password_reset_link(&self, token: &str, email: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("token", token)
            .append_pair("email", email)
            .finish();
        format!("{}/reset-password?{}", self.frontend_url, query)
    }

    /// Signed link confirming the current email address of `user`.
    pub fn verification_link(&self, user: &User) -> String {
        let expires = (self.clock.now() + self.policy.verification_ttl).timestamp();
        let user_id = user.id.to_string();
        let hash = email_verification_hash(&user.email);
        let signature = self
            .signer
            .sign(&verification_payload(&user_id, &hash, expires));
        format!(
            "{}/verify-email/{}/{}?expires={}&signature={}",
            self.app_url, user_id, hash, expires, signature
        )
    }

    /// Validates a verification link. Signature and expiry are checked before
    /// the user is looked up or the hash compared.
    pub async fn verify_link(
        &self,
        user_id: &str,
        hash: &str,
        expires: i64,
        signature: &str,
    ) -> Result<LinkCheck, AppError> {
        let payload = verification_payload(user_id, hash, expires);
        match self
            .signer
            .check(&payload, signature, expires, self.clock.now())
        {
            SignatureCheck::Valid => {}
            SignatureCheck::Invalid => return Ok(LinkCheck::BadSignature),
            SignatureCheck::Expired => return Ok(LinkCheck::Expired),
        }

        let Ok(id) = user_id.parse::<UserId>() else {
            return Ok(LinkCheck::UserNotFound);
        };
        let Some(user) = self.users.find_by_id(id).await? else {
            return Ok(LinkCheck::UserNotFound);
        };

        if !constant_time_eq(&email_verification_hash(&user.email), hash) {
            return Ok(LinkCheck::HashMismatch);
        }
        Ok(LinkCheck::Valid(user))
    }
}
