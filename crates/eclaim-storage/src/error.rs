//! Error types for audit persistence and registry lookups.

/// Errors raised by an [`AuditStore`](crate::AuditStore) or
/// [`EpisodeRegistry`](crate::EpisodeRegistry) backend.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// No audit record exists for the episode.
    #[error("Audit record not found: {episode}")]
    NotFound {
        /// Episode number (`noSep`) that was looked up.
        episode: String,
    },

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Any other backend failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuditError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(episode: impl Into<String>) -> Self {
        Self::NotFound {
            episode: episode.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
