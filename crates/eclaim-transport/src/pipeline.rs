//! End-to-end claim submission.
//!
//! validate → normalize → resolve service type → audit intake → encode →
//! encrypt → envelope → deliver (audit per attempt). Audit writes never affect
//! the outcome: a failed write is logged and the submission carries on.

use std::sync::Arc;

use async_trait::async_trait;
use eclaim_core::{
    BundleNormalizer, ClaimEnvelope, Credentials, NormalizationReport, SubmissionRequest, codec,
    crypto,
};
use eclaim_storage::{AuditStage, DynAuditStore, StageRecord};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::error::{SubmissionError, TransportError};
use crate::outcome::{FacilityInfo, SubmissionReceipt};
use crate::service_type::ServiceTypeResolver;
use crate::transport::{AttemptOutcome, AttemptRecord, AttemptRecorder, TransportClient};

/// Runs submissions. Cheap to clone; clones share the client and stores.
#[derive(Clone)]
pub struct ClaimSubmitter {
    credentials: Arc<Credentials>,
    normalizer: Arc<BundleNormalizer>,
    transport: TransportClient,
    resolver: ServiceTypeResolver,
    audit: DynAuditStore,
    facility: FacilityInfo,
}

impl ClaimSubmitter {
    pub fn new(
        transport: TransportClient,
        resolver: ServiceTypeResolver,
        audit: DynAuditStore,
        facility: FacilityInfo,
    ) -> Self {
        Self {
            credentials: transport.credentials().clone(),
            normalizer: Arc::new(BundleNormalizer::new()),
            transport,
            resolver,
            audit,
            facility,
        }
    }

    /// Use a custom repeatable-field table.
    pub fn with_normalizer(mut self, normalizer: BundleNormalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    pub fn facility(&self) -> &FacilityInfo {
        &self.facility
    }

    pub fn audit_store(&self) -> &DynAuditStore {
        &self.audit
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    #[instrument(skip_all)]
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionReceipt, SubmissionError> {
        let submission = request.validate()?;
        let episode = submission.episode_number.clone();

        let (normalized, report) = self.normalizer.normalize_with_report(&submission.bundle);
        let service_type = self
            .resolver
            .resolve(&episode, &submission.service_type)
            .await;

        let intake = StageRecord::new(
            submission.bundle.clone(),
            Value::Null,
            intake_metadata(&submission.bundle, &service_type.wire_value(), &report),
        );
        persist(&self.audit, &episode, AuditStage::Intake, intake).await;

        let framed = codec::encode(&normalized)?;
        let encrypted_payload = crypto::encrypt(&framed, &self.credentials)?;

        let envelope = ClaimEnvelope {
            episode_number: episode.clone(),
            service_type,
            period: submission.period,
            encrypted_payload,
        };

        info!(
            episode = %episode,
            entries = report.entries_after,
            dropped = report.dropped_entries(),
            payload_size = envelope.encrypted_payload.len(),
            "Submitting claim"
        );

        let recorder = AuditRecorder {
            audit: self.audit.clone(),
            episode: episode.clone(),
        };
        let delivery = match self.transport.deliver(&envelope, &recorder).await {
            Ok(delivery) => delivery,
            Err(e) => {
                if let TransportError::Failed(failure) = &e {
                    warn!(
                        episode = %episode,
                        attempts = failure.attempts.len(),
                        last_status = ?failure.last_status,
                        "Claim delivery failed"
                    );
                }
                return Err(e.into());
            }
        };

        info!(episode = %episode, via = %delivery.via, status = delivery.status, "Claim delivered");

        Ok(SubmissionReceipt {
            episode_number: episode,
            clearinghouse_response: delivery.response_json(),
            service_type: envelope.service_type,
            period: envelope.period,
            facility: self.facility.clone(),
            delivered_via: delivery.via,
            status: delivery.status,
            attempts: delivery.attempts.len(),
        })
    }
}

fn intake_metadata(bundle: &Value, service_type: &Value, report: &NormalizationReport) -> Value {
    let entry_count = match bundle.get("entry") {
        Some(Value::Array(entries)) => entries.len(),
        Some(Value::Object(entries)) => entries.len(),
        _ => 0,
    };
    json!({
        "serviceType": service_type,
        "entryCount": entry_count,
        "bundleType": bundle.get("type").cloned().unwrap_or(Value::Null),
        "normalization": {
            "entriesAfter": report.entries_after,
            "droppedEntries": report.dropped_entries(),
            "wrappedFields": report.wrapped_fields,
            "sectionsRekeyed": report.sections_rekeyed,
            "nullTextsFixed": report.null_texts_fixed,
            "warnings": report.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        },
    })
}

async fn persist(audit: &DynAuditStore, episode: &str, stage: AuditStage, record: StageRecord) {
    if let Err(e) = audit.upsert_stage(episode, stage, record).await {
        warn!(episode, %stage, error = %e, "Persistence warning: audit write failed");
    }
}

/// Writes each transport attempt to its audit stage.
struct AuditRecorder {
    audit: DynAuditStore,
    episode: String,
}

#[async_trait]
impl AttemptRecorder for AuditRecorder {
    async fn record(&self, attempt: &AttemptRecord) {
        let request = json!({
            "url": attempt.url,
            "contentType": attempt.content_type,
            "headers": attempt.headers,
            "timestamp": attempt.timestamp,
            "body": attempt.body,
        });
        let response = match &attempt.outcome {
            AttemptOutcome::Response {
                status,
                body,
                headers,
            } => json!({
                "status": status,
                "headers": headers,
                "body": serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.clone())),
            }),
            AttemptOutcome::Timeout { message } => json!({ "error": "timeout", "message": message }),
            AttemptOutcome::ConnectionFailed { message } => {
                json!({ "error": "connection", "message": message })
            }
        };
        let metadata = json!({
            "attempt": attempt.kind,
            "elapsedMs": attempt.elapsed_ms,
            "payloadSize": attempt.body.len(),
        });

        persist(
            &self.audit,
            &self.episode,
            attempt.kind.audit_stage(),
            StageRecord::new(request, response, metadata),
        )
        .await;
    }
}
