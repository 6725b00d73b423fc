//! Clearinghouse consumer credentials.
//!
//! Loaded once at startup and shared read-only (`Arc<Credentials>`) by the
//! cipher, the request signer and the transport client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Consumer credentials issued by the insurer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Consumer identifier (`X-cons-id`)
    pub consumer_id: String,
    /// Shared secret used for key derivation and HMAC signing
    pub consumer_secret: String,
    /// Facility (PPK) code issued by the insurer
    pub facility_code: String,
    /// API gateway user key (`user_key`)
    pub user_key: String,
    /// Base URL of the clearinghouse, without trailing slash
    pub base_url: String,
}

impl Credentials {
    pub fn new(
        consumer_id: impl Into<String>,
        consumer_secret: impl Into<String>,
        facility_code: impl Into<String>,
        user_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            consumer_secret: consumer_secret.into(),
            facility_code: facility_code.into(),
            user_key: user_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Summary safe to return to operators: secrets are masked.
    pub fn masked(&self) -> MaskedCredentials {
        MaskedCredentials {
            consumer_id: self.consumer_id.clone(),
            consumer_secret: mask(&self.consumer_secret),
            facility_code: self.facility_code.clone(),
            user_key: mask(&self.user_key),
            base_url: self.base_url.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_id", &self.consumer_id)
            .field("consumer_secret", &"***")
            .field("facility_code", &self.facility_code)
            .field("user_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Credentials with secrets replaced by a fixed mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedCredentials {
    pub consumer_id: String,
    pub consumer_secret: String,
    pub facility_code: String,
    pub user_key: String,
    pub base_url: String,
}

fn mask(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("1234", "s3cr3t", "0301R001", "uk-abc", "https://api.example.test/")
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        assert_eq!(creds().base_url, "https://api.example.test");
    }

    #[test]
    fn debug_never_prints_secrets() {
        let printed = format!("{:?}", creds());
        assert!(!printed.contains("s3cr3t"));
        assert!(!printed.contains("uk-abc"));
        assert!(printed.contains("1234"));
    }

    #[test]
    fn masked_summary_hides_secret_and_user_key() {
        let masked = creds().masked();
        assert_eq!(masked.consumer_secret, "***");
        assert_eq!(masked.user_key, "***");
        assert_eq!(masked.facility_code, "0301R001");
    }
}
