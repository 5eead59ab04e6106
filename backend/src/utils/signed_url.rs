//! HMAC-signed, expiring links.
//!
//! A signature covers the canonical payload `"{user_id}|{hash}|{expires}"` so any
//! edited path segment or expiry invalidates the link.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    Expired,
}

#[derive(Clone)]
pub struct UrlSigner {
    keyed: HmacSha256,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(key: impl AsRef<[u8]>) -> anyhow::Result<Self> {
        let keyed = HmacSha256::new_from_slice(key.as_ref())
            .map_err(|e| anyhow::anyhow!("Invalid signing key: {}", e))?;
        Ok(Self { keyed })
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload.as_bytes());
        mac
    }

    pub fn sign(&self, payload: &str) -> String {
        hex::encode(self.mac(payload).finalize().into_bytes())
    }

    /// Checks the signature first, then the expiry against `now`.
    pub fn check(
        &self,
        payload: &str,
        signature: &str,
        expires: i64,
        now: DateTime<Utc>,
    ) -> SignatureCheck {
        let Ok(raw) = hex::decode(signature) else {
            return SignatureCheck::Invalid;
        };
        if self.mac(payload).verify_slice(&raw).is_err() {
            return SignatureCheck::Invalid;
        }
        if now.timestamp() > expires {
            return SignatureCheck::Expired;
        }
        SignatureCheck::Valid
    }
}

pub fn verification_payload(user_id: &str, hash: &str, expires: i64) -> String {
    format!("{}|{}|{}", user_id, hash, expires)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).single().unwrap()
    }

    #[test]
    fn valid_signature_before_expiry() {
        let signer = UrlSigner::new("secret").unwrap();
        let payload = verification_payload("u1", "h1", 1_000);
        let sig = signer.sign(&payload);
        assert_eq!(
            signer.check(&payload, &sig, 1_000, at(999)),
            SignatureCheck::Valid
        );
        assert_eq!(
            signer.check(&payload, &sig, 1_000, at(1_000)),
            SignatureCheck::Valid
        );
    }

    #[test]
    fn expired_signature_is_reported_after_authenticity() {
        let signer = UrlSigner::new("secret").unwrap();
        let payload = verification_payload("u1", "h1", 1_000);
        let sig = signer.sign(&payload);
        assert_eq!(
            signer.check(&payload, &sig, 1_000, at(1_001)),
            SignatureCheck::Expired
        );
    }

    #[test]
    fn tampered_payload_or_key_is_invalid() {
        let signer = UrlSigner::new("secret").unwrap();
        let sig = signer.sign(&verification_payload("u1", "h1", 1_000));
        let tampered = verification_payload("u2", "h1", 1_000);
        assert_eq!(
            signer.check(&tampered, &sig, 1_000, at(0)),
            SignatureCheck::Invalid
        );

        let other = UrlSigner::new("other").unwrap();
        let payload = verification_payload("u1", "h1", 1_000);
        assert_eq!(
            other.check(&payload, &sig, 1_000, at(0)),
            SignatureCheck::Invalid
        );
        assert_eq!(
            signer.check(&payload, "zz-not-hex", 1_000, at(0)),
            SignatureCheck::Invalid
        );
    }
}
