//! In-memory backends for the eclaim storage contracts.
//!
//! Used by tests, by local runs without a database and by the server when
//! `storage.backend = "memory"`. Nothing survives a restart.
//!
//! # Example
//!
//! ```ignore
//! use eclaim_db_memory::InMemoryAuditStore;
//! use eclaim_storage::{AuditStage, AuditStore, StageRecord};
//!
//! let store = InMemoryAuditStore::new();
//! store
//!     .upsert_stage("0301R0010124V000001", AuditStage::Intake, stage)
//!     .await?;
//! ```

mod audit;
mod registry;

pub use audit::InMemoryAuditStore;
pub use registry::InMemoryEpisodeRegistry;

pub use eclaim_storage::{AuditStore, EpisodeRegistry};

/// Creates a shared in-memory audit store.
pub fn create_audit_store() -> eclaim_storage::DynAuditStore {
    std::sync::Arc::new(InMemoryAuditStore::new())
}

/// Creates a shared, empty in-memory episode registry.
pub fn create_episode_registry() -> eclaim_storage::DynEpisodeRegistry {
    std::sync::Arc::new(InMemoryEpisodeRegistry::new())
}
