//! # eclaim-storage
//!
//! Persistence contracts for the claims pipeline. This crate only defines
//! traits and record types; backends live in `eclaim-db-memory` and
//! `eclaim-db-postgres`.
//!
//! - [`AuditStore`] keeps one [`AuditRecord`] per episode with a section per
//!   pipeline stage (`intake`, `primaryAttempt`, `retryAttempt`,
//!   `fallbackAAttempt`, `fallbackBAttempt`).
//! - [`EpisodeRegistry`] answers the local service classification of an
//!   episode when the caller's service type is not a recognized code.

mod error;
mod traits;
mod types;

pub use error::AuditError;
pub use traits::{AuditStore, EpisodeRegistry};
pub use types::{AuditRecord, AuditStage, StageRecord};

/// Type alias for a storage result.
pub type AuditResult<T> = Result<T, AuditError>;

/// Type alias for a shared audit store.
pub type DynAuditStore = std::sync::Arc<dyn AuditStore>;

/// Type alias for a shared episode registry.
pub type DynEpisodeRegistry = std::sync::Arc<dyn EpisodeRegistry>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        AuditError, AuditRecord, AuditResult, AuditStage, AuditStore, DynAuditStore,
        DynEpisodeRegistry, EpisodeRegistry, StageRecord,
    };
}
