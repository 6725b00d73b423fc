//! Time-bound request signatures.
//!
//! `signature = base64(HMAC-SHA256(consumerId + "&" + timestamp, consumerSecret))`
//! over the raw digest. The clearinghouse rejects stale timestamps, so a
//! signature is minted immediately before each network attempt and never
//! reused.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_CONS_ID: &str = "X-cons-id";
pub const HEADER_TIMESTAMP: &str = "X-timestamp";
pub const HEADER_SIGNATURE: &str = "X-signature";
pub const HEADER_USER_KEY: &str = "user_key";

/// Source of unix time in seconds.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Manually driven clock for tests and replay tooling.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A signature bound to one timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub consumer_id: String,
    pub user_key: String,
    /// Unix seconds, decimal
    pub timestamp: String,
    /// Base64 HMAC-SHA256
    pub signature: String,
    unix: u64,
}

impl SignedRequest {
    pub fn unix_time(&self) -> u64 {
        self.unix
    }

    /// Authentication headers for this attempt.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_CONS_ID, self.consumer_id.clone()),
            (HEADER_TIMESTAMP, self.timestamp.clone()),
            (HEADER_SIGNATURE, self.signature.clone()),
            (HEADER_USER_KEY, self.user_key.clone()),
        ]
    }
}

/// Compute the raw signature for a given timestamp.
pub fn signature_for(credentials: &Credentials, timestamp: &str) -> String {
    let message = format!("{}&{}", credentials.consumer_id, timestamp);
    let mut mac = HmacSha256::new_from_slice(credentials.consumer_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Sign for an explicit unix time.
pub fn sign_at(credentials: &Credentials, unix: u64) -> SignedRequest {
    let timestamp = unix.to_string();
    let signature = signature_for(credentials, &timestamp);
    SignedRequest {
        consumer_id: credentials.consumer_id.clone(),
        user_key: credentials.user_key.clone(),
        timestamp,
        signature,
        unix,
    }
}

/// Sign with the current time.
pub fn sign(credentials: &Credentials, clock: &dyn Clock) -> SignedRequest {
    sign_at(credentials, clock.now_unix())
}

/// Sign with a timestamp strictly greater than `previous`.
///
/// Attempts within the same wall-clock second would otherwise share a
/// timestamp; the later one is moved forward by whole seconds.
pub fn sign_after(
    credentials: &Credentials,
    clock: &dyn Clock,
    previous: Option<&SignedRequest>,
) -> SignedRequest {
    let now = clock.now_unix();
    let unix = match previous {
        Some(prev) if now <= prev.unix => prev.unix + 1,
        _ => now,
    };
    sign_at(credentials, unix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("1234", "secret", "0301R001", "uk-1", "https://example.test")
    }

    #[test]
    fn signature_matches_hmac_of_consumer_and_timestamp() {
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"1234&1700000000");
        let expected = BASE64.encode(mac.finalize().into_bytes());
        assert_eq!(sign_at(&creds(), 1_700_000_000).signature, expected);
    }

    #[test]
    fn signing_is_deterministic() {
        assert_eq!(sign_at(&creds(), 42), sign_at(&creds(), 42));
    }

    #[test]
    fn different_timestamps_give_different_signatures() {
        assert_ne!(
            sign_at(&creds(), 1_700_000_000).signature,
            sign_at(&creds(), 1_700_000_001).signature
        );
    }

    #[test]
    fn headers_carry_identity_and_signature() {
        let signed = sign_at(&creds(), 1_700_000_000);
        let headers = signed.headers();
        assert!(headers.contains(&(HEADER_CONS_ID, "1234".to_string())));
        assert!(headers.contains(&(HEADER_TIMESTAMP, "1700000000".to_string())));
        assert!(headers.contains(&(HEADER_USER_KEY, "uk-1".to_string())));
        assert!(headers.contains(&(HEADER_SIGNATURE, signed.signature.clone())));
    }

    #[test]
    fn sign_reads_the_clock() {
        let clock = ManualClock::new(1_700_000_123);
        assert_eq!(sign(&creds(), &clock).timestamp, "1700000123");
    }

    #[test]
    fn sign_after_is_strictly_increasing_within_one_second() {
        let clock = ManualClock::new(1_700_000_000);
        let first = sign(&creds(), &clock);
        let second = sign_after(&creds(), &clock, Some(&first));
        let third = sign_after(&creds(), &clock, Some(&second));
        assert_eq!(second.unix_time(), 1_700_000_001);
        assert_eq!(third.unix_time(), 1_700_000_002);
        assert_ne!(first.signature, second.signature);
    }

    #[test]
    fn sign_after_uses_clock_once_it_has_moved_on() {
        let clock = ManualClock::new(1_700_000_000);
        let first = sign(&creds(), &clock);
        clock.advance(5);
        assert_eq!(
            sign_after(&creds(), &clock, Some(&first)).unix_time(),
            1_700_000_005
        );
    }
}
