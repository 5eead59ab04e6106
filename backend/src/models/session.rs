//! Opaque bearer session tokens.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::models::user::User;
use crate::types::{SessionTokenId, UserId};

/// Name recorded for tokens issued by register and login.
pub const AUTH_TOKEN_NAME: &str = "auth_token";

#[derive(Debug, Clone, FromRow)]
/// Database representation of a session token. The plain token is never stored.
pub struct SessionToken {
    pub id: SessionTokenId,
    pub user_id: UserId,
    pub name: String,
    /// SHA-256 hex digest of the bearer token.
    pub token_hash: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(user_id: UserId, name: &str, token_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionTokenId::new(),
            user_id,
            name: name.to_string(),
            token_hash,
            last_used_at: None,
            created_at: now,
        }
    }
}

/// The authenticated caller of a request, resolved from its bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Hash of the bearer token used for this request.
    pub token_hash: String,
}
