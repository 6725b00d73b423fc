use thiserror::Error;

/// Core error types for claim preparation
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid field {field}: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Cipher initialization failed: {0}")]
    Crypto(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Payload encoding failed: {0}")]
    Encoding(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Base64 decoding error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Create a new MissingFields error
    pub fn missing_fields(fields: Vec<&'static str>) -> Self {
        Self::MissingFields(fields)
    }

    /// Create a new InvalidField error
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }

    /// Create a new Crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    /// Create a new Decrypt error
    pub fn decrypt(message: impl Into<String>) -> Self {
        Self::Decrypt(message.into())
    }

    /// Create a new Encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    /// Check if this error rejects the submission before any pipeline stage runs
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::MissingFields(_) | Self::InvalidField { .. })
    }

    /// Check if this error comes from key derivation or the cipher.
    ///
    /// These are never retried: they point at malformed configuration.
    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Self::Crypto(_) | Self::Decrypt(_))
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
