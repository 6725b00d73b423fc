//! Audit record types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Pipeline stage an audit section belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditStage {
    Intake,
    PrimaryAttempt,
    RetryAttempt,
    FallbackAAttempt,
    FallbackBAttempt,
}

impl AuditStage {
    /// All stages in pipeline order.
    pub const ALL: [AuditStage; 5] = [
        Self::Intake,
        Self::PrimaryAttempt,
        Self::RetryAttempt,
        Self::FallbackAAttempt,
        Self::FallbackBAttempt,
    ];

    /// Key used in the serialized record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::PrimaryAttempt => "primaryAttempt",
            Self::RetryAttempt => "retryAttempt",
            Self::FallbackAAttempt => "fallbackAAttempt",
            Self::FallbackBAttempt => "fallbackBAttempt",
        }
    }

    /// `true` for the four transport attempt stages.
    pub fn is_attempt(&self) -> bool {
        !matches!(self, Self::Intake)
    }
}

impl fmt::Display for AuditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one stage sent and received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    /// Raw request (intake: the pre-normalization bundle)
    pub request: Value,
    /// Raw response; `null` for intake
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub metadata: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl StageRecord {
    pub fn new(request: Value, response: Value, metadata: Value) -> Self {
        Self {
            request,
            response,
            metadata,
            recorded_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Audit trail of one episode, upserted stage by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub episode_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intake: Option<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_attempt: Option<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_a_attempt: Option<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_b_attempt: Option<StageRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl AuditRecord {
    pub fn new(episode_number: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            episode_number: episode_number.into(),
            intake: None,
            primary_attempt: None,
            retry_attempt: None,
            fallback_a_attempt: None,
            fallback_b_attempt: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self, stage: AuditStage) -> Option<&StageRecord> {
        self.slot(stage).as_ref()
    }

    /// Replace one stage, leaving the others untouched.
    pub fn set_stage(&mut self, stage: AuditStage, record: StageRecord) {
        if record.recorded_at > self.updated_at {
            self.updated_at = record.recorded_at;
        }
        *self.slot_mut(stage) = Some(record);
    }

    /// Stages that hold data, in pipeline order.
    pub fn recorded_stages(&self) -> Vec<AuditStage> {
        AuditStage::ALL
            .into_iter()
            .filter(|s| self.stage(*s).is_some())
            .collect()
    }

    /// Most recently written attempt stage.
    ///
    /// Resubmissions overwrite stages individually, so a later pipeline
    /// stage may be older than an earlier one; recency decides.
    pub fn latest_attempt(&self) -> Option<(AuditStage, &StageRecord)> {
        AuditStage::ALL
            .into_iter()
            .filter(AuditStage::is_attempt)
            .filter_map(|s| self.stage(s).map(|r| (s, r)))
            .max_by_key(|(_, r)| r.recorded_at)
    }

    fn slot(&self, stage: AuditStage) -> &Option<StageRecord> {
        match stage {
            AuditStage::Intake => &self.intake,
            AuditStage::PrimaryAttempt => &self.primary_attempt,
            AuditStage::RetryAttempt => &self.retry_attempt,
            AuditStage::FallbackAAttempt => &self.fallback_a_attempt,
            AuditStage::FallbackBAttempt => &self.fallback_b_attempt,
        }
    }

    fn slot_mut(&mut self, stage: AuditStage) -> &mut Option<StageRecord> {
        match stage {
            AuditStage::Intake => &mut self.intake,
            AuditStage::PrimaryAttempt => &mut self.primary_attempt,
            AuditStage::RetryAttempt => &mut self.retry_attempt,
            AuditStage::FallbackAAttempt => &mut self.fallback_a_attempt,
            AuditStage::FallbackBAttempt => &mut self.fallback_b_attempt,
        }
    }
}
