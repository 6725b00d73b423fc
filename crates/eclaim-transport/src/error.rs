use eclaim_core::CoreError;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::transport::AttemptRecord;

/// Everything an operator needs to diagnose a failed delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportFailure {
    pub endpoint: String,
    /// Status of the last attempt that got an HTTP response
    pub last_status: Option<u16>,
    /// Body of the last response, or the last transport error text
    pub last_body: String,
    /// Every attempt in order, with the headers and timestamp it carried
    pub attempts: Vec<AttemptRecord>,
}

impl TransportFailure {
    fn summary(&self) -> String {
        match self.last_status {
            Some(status) => format!("last status {status}"),
            None => format!("no response: {}", self.last_body),
        }
    }
}

/// Delivery errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Delivery failed after {} attempt(s), {}", .0.attempts.len(), .0.summary())]
    Failed(Box<TransportFailure>),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Failed to build request body: {0}")]
    Body(String),
}

impl TransportError {
    pub fn failure(&self) -> Option<&TransportFailure> {
        match self {
            Self::Failed(failure) => Some(&**failure),
            _ => None,
        }
    }
}

/// Errors returned by the submission pipeline.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Request rejected before any stage ran
    #[error("{0}")]
    Validation(CoreError),

    /// Cipher could not be set up; never retried
    #[error("{0}")]
    Crypto(CoreError),

    #[error("{0}")]
    Encoding(CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<CoreError> for SubmissionError {
    fn from(err: CoreError) -> Self {
        if err.is_validation_error() {
            Self::Validation(err)
        } else if err.is_crypto_error() {
            Self::Crypto(err)
        } else {
            Self::Encoding(err)
        }
    }
}

impl SubmissionError {
    /// HTTP status to answer the caller with.
    ///
    /// Delivery failures mirror the clearinghouse's last status, or 502 when
    /// it never answered.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Crypto(_) | Self::Encoding(_) => 500,
            Self::Transport(TransportError::Failed(failure)) => failure
                .last_status
                .filter(|s| (400..=599).contains(s))
                .unwrap_or(502),
            Self::Transport(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Crypto(_) => "crypto",
            Self::Encoding(_) => "encoding",
            Self::Transport(_) => "transport",
        }
    }

    /// Failure body: `{success: false, error, httpStatus, diagnostics}`.
    pub fn to_json(&self) -> Value {
        let diagnostics = match self {
            Self::Transport(TransportError::Failed(failure)) => {
                serde_json::to_value(&**failure).unwrap_or(Value::Null)
            }
            Self::Validation(CoreError::MissingFields(fields)) => json!({ "missingFields": fields }),
            _ => json!({ "kind": self.kind() }),
        };
        json!({
            "success": false,
            "error": self.to_string(),
            "httpStatus": self.http_status(),
            "diagnostics": diagnostics,
        })
    }
}
