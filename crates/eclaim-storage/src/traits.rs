//! Storage traits for the audit trail and the episode registry.

use async_trait::async_trait;

use crate::error::AuditError;
use crate::types::{AuditRecord, AuditStage, StageRecord};

/// Durable audit trail of claim submissions, keyed by episode number.
///
/// Implementations must be thread-safe (`Send + Sync`). Writes for one
/// episode must converge: two concurrent `upsert_stage` calls for different
/// stages both end up in the record.
///
/// # Example
///
/// ```ignore
/// use eclaim_storage::{AuditStage, AuditStore, StageRecord};
///
/// async fn record_intake(store: &dyn AuditStore, episode: &str, bundle: Value) {
///     let stage = StageRecord::new(bundle, Value::Null, json!({"entryCount": 3}));
///     if let Err(e) = store.upsert_stage(episode, AuditStage::Intake, stage).await {
///         tracing::warn!(episode, error = %e, "audit write failed");
///     }
/// }
/// ```
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Writes one stage of an episode's record.
    ///
    /// Creates the record on first write; afterwards replaces only the named
    /// stage. Returns the record as stored.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn upsert_stage(
        &self,
        episode: &str,
        stage: AuditStage,
        record: StageRecord,
    ) -> Result<AuditRecord, AuditError>;

    /// Reads the record of an episode.
    ///
    /// Returns `None` if nothing was ever recorded for it.
    async fn get(&self, episode: &str) -> Result<Option<AuditRecord>, AuditError>;

    /// Deletes the record of an episode.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if there is no record.
    async fn delete(&self, episode: &str) -> Result<(), AuditError>;

    /// Lists records, most recently updated first.
    async fn list(&self, limit: usize) -> Result<Vec<AuditRecord>, AuditError>;
}

/// Local lookup of an episode's service classification.
///
/// The classification is free text maintained by the registration desk
/// (for example "Rawat Inap" or "Rawat Jalan").
#[async_trait]
pub trait EpisodeRegistry: Send + Sync {
    /// Returns the classification, or `None` if the episode is unknown.
    async fn service_classification(&self, episode: &str) -> Result<Option<String>, AuditError>;
}
