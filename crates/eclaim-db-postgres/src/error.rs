//! Error types for the PostgreSQL backend.

use eclaim_storage::AuditError;

/// Errors specific to the PostgreSQL backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::error::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for AuditError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Database(e @ sqlx_core::error::Error::PoolTimedOut)
            | PostgresError::Database(e @ sqlx_core::error::Error::PoolClosed)
            | PostgresError::Database(e @ sqlx_core::error::Error::Io(_)) => {
                AuditError::connection(e.to_string())
            }
            PostgresError::Database(e) => AuditError::internal(e.to_string()),
            PostgresError::Config { message } => {
                AuditError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_map_to_connection_errors() {
        let err: AuditError = PostgresError::Database(sqlx_core::error::Error::PoolTimedOut).into();
        assert!(matches!(err, AuditError::Connection { .. }));
    }

    #[test]
    fn config_errors_map_to_internal() {
        let err: AuditError = PostgresError::config("url is empty").into();
        assert_eq!(err.to_string(), "Internal error: Configuration error: url is empty");
    }
}
