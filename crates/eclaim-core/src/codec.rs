//! Canonical JSON → gzip → base64 framing of a normalized bundle.

use std::io::{Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Serialize, compress at maximum level and base64-encode a bundle.
///
/// `serde_json` never escapes `/`, so paths and URLs stay readable when the
/// payload is inspected. The gzip header carries no timestamp, which keeps
/// the output byte-identical for identical input.
pub fn encode(bundle: &Value) -> Result<String> {
    let json = serde_json::to_vec(bundle)?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::best());
    encoder
        .write_all(&json)
        .map_err(|e| CoreError::encoding(format!("gzip write failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CoreError::encoding(format!("gzip finish failed: {e}")))?;

    Ok(BASE64.encode(compressed))
}

/// Inverse of [`encode`]: base64 → gunzip → JSON.
pub fn decode(framed: &str) -> Result<Value> {
    let compressed = BASE64.decode(framed.trim())?;
    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}
