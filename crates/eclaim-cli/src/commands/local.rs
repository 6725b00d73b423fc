use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use colored::Colorize;
use eclaim_core::{BundleNormalizer, Credentials, SystemClock, codec, crypto, seal_bundle, signer};
use serde_json::{Map, Value};

use crate::cli::{CredentialArgs, DecryptArgs, NormalizeArgs, OutputFormat, SealArgs, SignArgs};
use crate::output::{print_value, print_warning};

impl CredentialArgs {
    fn credentials(&self) -> Credentials {
        // Base URL plays no part in sealing or signing
        Credentials::new(
            &self.cons_id,
            &self.secret,
            &self.facility_code,
            &self.user_key,
            "",
        )
    }
}

pub fn normalize(args: &NormalizeArgs, format: OutputFormat) -> Result<()> {
    let bundle = super::read_json(&args.file)?;
    let (normalized, report) = BundleNormalizer::new().normalize_with_report(&bundle);

    for warning in &report.warnings {
        print_warning(&warning.to_string());
    }
    eprintln!(
        "{}: {} → {} entries, {} field(s) wrapped, {} section(s) rekeyed, {} null text(s) fixed",
        "Normalized".cyan(),
        report.entries_before,
        report.entries_after,
        report.wrapped_fields,
        report.sections_rekeyed,
        report.null_texts_fixed,
    );
    print_value(&normalized, format);
    Ok(())
}

pub fn seal(args: &SealArgs) -> Result<()> {
    let bundle = super::read_json(&args.file)?;
    let credentials = args.credentials.credentials();
    let sealed = seal_bundle(&BundleNormalizer::new(), &bundle, &credentials)?;

    for warning in &sealed.report.warnings {
        print_warning(&warning.to_string());
    }
    eprintln!(
        "{}: {} entries, {} bytes of dataMR",
        "Sealed".cyan(),
        sealed.report.entries_after,
        sealed.ciphertext.len()
    );
    println!("{}", sealed.ciphertext);
    Ok(())
}

pub fn decrypt(args: &DecryptArgs, format: OutputFormat) -> Result<()> {
    let raw = match &args.data {
        Some(data) => data.clone(),
        None => super::read_input(&args.file)?,
    };
    let ciphertext = unwrap_payload(raw.trim(), args.rewrapped)?;

    let credentials = args.credentials.credentials();
    let framed = crypto::decrypt(&ciphertext, &credentials)
        .context("Decryption failed; check the consumer ID, secret and facility code")?;
    let bundle = codec::decode(&framed)?;
    print_value(&bundle, format);
    Ok(())
}

/// Strips the outer base64 layer used by the JSON fallback encoding.
fn unwrap_payload(data: &str, rewrapped: bool) -> Result<String> {
    if !rewrapped {
        return Ok(data.to_string());
    }
    let bytes = STANDARD
        .decode(data)
        .context("--rewrapped payload is not base64")?;
    String::from_utf8(bytes).context("--rewrapped payload does not hold base64 text")
}

pub fn sign(args: &SignArgs, format: OutputFormat) -> Result<()> {
    let credentials = args.credentials.credentials();
    let signed = match args.timestamp {
        Some(ts) => signer::sign_at(&credentials, ts),
        None => signer::sign(&credentials, &SystemClock),
    };

    let mut headers = Map::new();
    for (name, value) in signed.headers() {
        headers.insert(name.to_string(), Value::String(value));
    }
    print_value(&Value::Object(headers), format);
    Ok(())
}
