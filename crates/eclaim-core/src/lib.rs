//! Claim preparation for the insurance clearinghouse.
//!
//! Everything here is pure and synchronous: bundle normalization, payload
//! framing (JSON → gzip → base64), the mandated AES-256-CBC seal and the
//! time-bound HMAC request signature. Network delivery lives in
//! `eclaim-transport`.

pub mod bundle;
pub mod claim;
pub mod codec;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod signer;

pub use bundle::{
    BundleNormalizer, DEFAULT_REPEATABLE_FIELDS, NormalizationReport, NormalizationWarning,
};
pub use claim::{
    BillingPeriod, ClaimEnvelope, ResolvedServiceType, ServiceType, Submission,
    SubmissionRequest,
};
pub use credentials::{Credentials, MaskedCredentials};
pub use error::{CoreError, Result};
pub use signer::{Clock, ManualClock, SignedRequest, SystemClock};

/// Normalize, frame and encrypt a bundle in one step.
///
/// Returns the normalized bundle with its report alongside the base64
/// ciphertext so callers can audit what was actually sealed.
pub fn seal_bundle(
    normalizer: &BundleNormalizer,
    bundle: &serde_json::Value,
    credentials: &Credentials,
) -> Result<SealedBundle> {
    let (normalized, report) = normalizer.normalize_with_report(bundle);
    let framed = codec::encode(&normalized)?;
    let ciphertext = crypto::encrypt(&framed, credentials)?;
    Ok(SealedBundle {
        normalized,
        report,
        ciphertext,
    })
}

/// Output of [`seal_bundle`].
#[derive(Debug, Clone)]
pub struct SealedBundle {
    pub normalized: serde_json::Value,
    pub report: NormalizationReport,
    pub ciphertext: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sealed_bundle_opens_back_to_normalized_form() {
        let creds = Credentials::new("1", "s", "F", "u", "https://x.test");
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Procedure", "note": {"text": null}}},
                {"resource": null}
            ]
        });

        let sealed = seal_bundle(&BundleNormalizer::new(), &bundle, &creds).unwrap();
        let framed = crypto::decrypt(&sealed.ciphertext, &creds).unwrap();
        let opened = codec::decode(&framed).unwrap();

        assert_eq!(opened, sealed.normalized);
        assert_eq!(opened["entry"][0]["resource"]["note"][0]["text"], json!(""));
        assert_eq!(sealed.report.dropped_entries(), 1);
    }
}
