//! PostgreSQL audit store.
//!
//! One row per episode; the record itself is a JSONB document shaped like
//! [`AuditRecord`]. A stage write is a single `INSERT .. ON CONFLICT` that
//! merges just that stage's key, so concurrent writes for one episode
//! converge without read-modify-write races.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde_json::{Map, Value};
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use eclaim_storage::{AuditError, AuditRecord, AuditStage, AuditStore, StageRecord};

use crate::error::PostgresError;

const TABLE_KEY: &str = "claim_audit";

/// PostgreSQL implementation of [`AuditStore`].
#[derive(Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
    tables_created: Arc<DashSet<String>>,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tables_created: Arc::new(DashSet::new()),
        }
    }

    /// Ensure the audit table exists.
    #[instrument(skip(self))]
    pub async fn ensure_tables(&self) -> Result<(), AuditError> {
        if self.tables_created.contains(TABLE_KEY) {
            return Ok(());
        }

        sqlx_core::query::query(
            r#"
            CREATE TABLE IF NOT EXISTS claim_audit (
                no_sep TEXT PRIMARY KEY,
                record JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        sqlx_core::query::query(
            "CREATE INDEX IF NOT EXISTS idx_claim_audit_updated ON claim_audit(updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        info!("Created claim audit table");
        self.tables_created.insert(TABLE_KEY.to_string());
        Ok(())
    }

    fn time_to_chrono(t: OffsetDateTime) -> DateTime<Utc> {
        DateTime::from_timestamp(t.unix_timestamp(), t.nanosecond()).unwrap_or_else(Utc::now)
    }

    fn decode(record: Value) -> Result<AuditRecord, AuditError> {
        Ok(serde_json::from_value(record)?)
    }
}

/// Document inserted when the episode has no row yet.
fn initial_document(
    episode: &str,
    stage: AuditStage,
    record: &StageRecord,
) -> Result<Value, AuditError> {
    let mut fresh = AuditRecord::new(episode);
    fresh.created_at = record.recorded_at.min(fresh.created_at);
    fresh.set_stage(stage, record.clone());
    Ok(serde_json::to_value(fresh)?)
}

/// Keys merged into an existing document.
fn stage_patch(stage: AuditStage, record: &StageRecord) -> Result<Value, AuditError> {
    let updated_at = serde_json::to_value(record)?
        .get("recordedAt")
        .cloned()
        .unwrap_or(Value::Null);
    let mut patch = Map::new();
    patch.insert(stage.as_str().to_string(), serde_json::to_value(record)?);
    patch.insert("updatedAt".to_string(), updated_at);
    Ok(Value::Object(patch))
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn upsert_stage(
        &self,
        episode: &str,
        stage: AuditStage,
        record: StageRecord,
    ) -> Result<AuditRecord, AuditError> {
        self.ensure_tables().await?;

        let initial = initial_document(episode, stage, &record)?;
        let patch = stage_patch(stage, &record)?;
        let at = Self::time_to_chrono(record.recorded_at);

        let (stored,): (Value,) = sqlx_core::query_as::query_as(
            r#"
            INSERT INTO claim_audit (no_sep, record, created_at, updated_at)
            VALUES ($1, $2, $4, $4)
            ON CONFLICT (no_sep) DO UPDATE
            SET record = claim_audit.record || $3,
                updated_at = GREATEST(claim_audit.updated_at, $4)
            RETURNING record
            "#,
        )
        .bind(episode)
        .bind(initial)
        .bind(patch)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        debug!(episode, %stage, "Stored audit stage");
        Self::decode(stored)
    }

    async fn get(&self, episode: &str) -> Result<Option<AuditRecord>, AuditError> {
        self.ensure_tables().await?;

        let row: Option<(Value,)> =
            sqlx_core::query_as::query_as("SELECT record FROM claim_audit WHERE no_sep = $1")
                .bind(episode)
                .fetch_optional(&self.pool)
                .await
                .map_err(PostgresError::from)?;

        row.map(|(record,)| Self::decode(record)).transpose()
    }

    async fn delete(&self, episode: &str) -> Result<(), AuditError> {
        self.ensure_tables().await?;

        let result = sqlx_core::query::query("DELETE FROM claim_audit WHERE no_sep = $1")
            .bind(episode)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        if result.rows_affected() == 0 {
            return Err(AuditError::not_found(episode));
        }
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<AuditRecord>, AuditError> {
        self.ensure_tables().await?;

        let rows: Vec<(Value,)> = sqlx_core::query_as::query_as(
            "SELECT record FROM claim_audit ORDER BY updated_at DESC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        rows.into_iter().map(|(record,)| Self::decode(record)).collect()
    }
}
