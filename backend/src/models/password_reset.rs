//! Models for password reset functionality.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
/// Database representation of a password reset token, keyed by email.
pub struct PasswordResetToken {
    /// Lower-cased email of the account the token belongs to.
    pub email: String,
    /// SHA-256 hash of the reset token (for security).
    pub token_hash: String,
    /// Wrong-token submissions counted against this token.
    pub failed_attempts: i32,
    /// Issue time. Expiry and throttling are derived from it.
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.created_at + ttl < now
    }
}

/// Outcome of consuming a reset token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetFailure {
    InvalidToken,
    InvalidUser,
    Throttled,
}

impl ResetFailure {
    pub fn field(&self) -> &'static str {
        match self {
            ResetFailure::InvalidToken => "token",
            ResetFailure::InvalidUser | ResetFailure::Throttled => "email",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ResetFailure::InvalidToken => {
                "This password reset token is invalid or has expired. Please request a new reset link."
            }
            ResetFailure::InvalidUser => "We can't find a user with that email address.",
            ResetFailure::Throttled => "Too many attempts. Please try again later.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_relative_to_created_at() {
        let now = Utc::now();
        let token = PasswordResetToken {
            email: "a@example.com".into(),
            token_hash: "h".into(),
            failed_attempts: 0,
            created_at: now - Duration::minutes(61),
        };
        assert!(token.is_expired(Duration::minutes(60), now));
        assert!(!token.is_expired(Duration::minutes(90), now));
    }

    #[test]
    fn failures_map_to_expected_fields() {
        assert_eq!(ResetFailure::InvalidToken.field(), "token");
        assert_eq!(ResetFailure::InvalidUser.field(), "email");
        assert_eq!(ResetFailure::Throttled.field(), "email");
    }
}
