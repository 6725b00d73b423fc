use async_trait::async_trait;
use dashmap::DashMap;
use eclaim_storage::{AuditError, AuditRecord, AuditStage, AuditStore, StageRecord};

/// In-memory audit store.
///
/// Upserts go through `DashMap::entry`, which holds the shard lock for the
/// episode while the stage is written, so concurrent writes for one episode
/// never lose each other's stages.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    records: DashMap<String, AuditRecord>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn upsert_stage(
        &self,
        episode: &str,
        stage: AuditStage,
        record: StageRecord,
    ) -> Result<AuditRecord, AuditError> {
        let mut entry = self
            .records
            .entry(episode.to_string())
            .or_insert_with(|| AuditRecord::new(episode));
        entry.set_stage(stage, record);
        tracing::trace!(episode, %stage, "audit stage stored in memory");
        Ok(entry.clone())
    }

    async fn get(&self, episode: &str) -> Result<Option<AuditRecord>, AuditError> {
        Ok(self.records.get(episode).map(|r| r.value().clone()))
    }

    async fn delete(&self, episode: &str) -> Result<(), AuditError> {
        self.records
            .remove(episode)
            .map(|_| ())
            .ok_or_else(|| AuditError::not_found(episode))
    }

    async fn list(&self, limit: usize) -> Result<Vec<AuditRecord>, AuditError> {
        let mut records: Vec<AuditRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records.truncate(limit);
        Ok(records)
    }
}
