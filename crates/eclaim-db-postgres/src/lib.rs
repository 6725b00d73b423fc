//! PostgreSQL backends for the eclaim storage contracts.
//!
//! # Example
//!
//! ```ignore
//! use eclaim_db_postgres::{PostgresConfig, PostgresAuditStore, create_pool};
//!
//! let pool = create_pool(&PostgresConfig::new("postgres://simrs@localhost/simrs")).await?;
//! let store = PostgresAuditStore::new(pool.clone());
//! store.ensure_tables().await?;
//! ```
//!
//! - [`config`]: connection settings
//! - [`pool`]: connection pool management
//! - [`PostgresAuditStore`]: JSONB audit records in `claim_audit`
//! - [`PostgresEpisodeRegistry`]: lookups against `bridging_sep`

mod audit;
pub mod config;
mod error;
pub mod pool;
mod registry;

pub use audit::PostgresAuditStore;
pub use config::PostgresConfig;
pub use error::{PostgresError, Result};
pub use pool::create_pool;
pub use registry::PostgresEpisodeRegistry;

pub use sqlx_postgres::PgPool;
