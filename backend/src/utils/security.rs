//! Token generation and digest helpers shared by the session and reset flows.

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of an opaque bearer session token (~238 bits of entropy).
pub const SESSION_TOKEN_LENGTH: usize = 40;
/// Length of a password reset token.
pub const RESET_TOKEN_LENGTH: usize = 64;

/// Generates a random alphanumeric token from the OS RNG.
pub fn generate_token(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generates `bytes` random bytes rendered as lowercase hex.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill(buf.as_mut_slice());
    hex::encode(buf)
}

/// SHA-256 digest of a token, hex encoded. Only digests are persisted.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-1 digest of an email address, used as the verification link hash.
pub fn email_verification_hash(email: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(email.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_have_requested_length_and_charset() {
        let token = generate_token(SESSION_TOKEN_LENGTH);
        assert_eq!(token.len(), SESSION_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token(SESSION_TOKEN_LENGTH));
    }

    #[test]
    fn random_hex_doubles_length() {
        let value = random_hex(8);
        assert_eq!(value.len(), 16);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_token_is_stable() {
        let token = "test-token-123";
        let hash1 = hash_token(token);
        let hash2 = hash_token(token);
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash_token("different-token"), hash1);
    }

    #[test]
    fn email_hash_matches_known_sha1() {
        assert_eq!(
            email_verification_hash("abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn constant_time_eq_compares_contents() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
