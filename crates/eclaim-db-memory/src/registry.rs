use async_trait::async_trait;
use dashmap::DashMap;
use eclaim_storage::{AuditError, EpisodeRegistry};

/// Episode registry backed by a map of episode number → classification.
#[derive(Debug, Default)]
pub struct InMemoryEpisodeRegistry {
    classifications: DashMap<String, String>,
}

impl InMemoryEpisodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration, handy in tests.
    pub fn with_episode(self, episode: impl Into<String>, classification: impl Into<String>) -> Self {
        self.insert(episode, classification);
        self
    }

    pub fn insert(&self, episode: impl Into<String>, classification: impl Into<String>) {
        self.classifications
            .insert(episode.into(), classification.into());
    }
}

#[async_trait]
impl EpisodeRegistry for InMemoryEpisodeRegistry {
    async fn service_classification(&self, episode: &str) -> Result<Option<String>, AuditError> {
        Ok(self.classifications.get(episode).map(|c| c.value().clone()))
    }
}
