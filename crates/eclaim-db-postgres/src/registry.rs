//! Episode registry backed by the hospital's bridging table.

use async_trait::async_trait;
use sqlx_postgres::PgPool;
use tracing::debug;

use eclaim_storage::{AuditError, EpisodeRegistry};

use crate::error::PostgresError;

/// Reads `bridging_sep.jnspelayanan`, the free-text classification the
/// registration desk stores when an episode number is issued.
#[derive(Clone)]
pub struct PostgresEpisodeRegistry {
    pool: PgPool,
}

impl PostgresEpisodeRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EpisodeRegistry for PostgresEpisodeRegistry {
    async fn service_classification(&self, episode: &str) -> Result<Option<String>, AuditError> {
        let row: Option<(Option<String>,)> = sqlx_core::query_as::query_as(
            "SELECT jnspelayanan FROM bridging_sep WHERE no_sep = $1 LIMIT 1",
        )
        .bind(episode)
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        let classification = row.and_then(|(c,)| c).filter(|c| !c.trim().is_empty());
        debug!(episode, found = classification.is_some(), "Episode classification lookup");
        Ok(classification)
    }
}
