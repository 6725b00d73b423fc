//! HTTP delivery of a sealed claim.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use eclaim_core::signer::{self, HEADER_USER_KEY};
use eclaim_core::{ClaimEnvelope, Clock, Credentials, SignedRequest, SystemClock};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::error::{TransportError, TransportFailure};
use crate::state::{AttemptKind, Observation, TransportState};

/// Default claims endpoint path on the clearinghouse.
pub const DEFAULT_CLAIMS_PATH: &str = "/medicalrecord/eclaim/rekammedis/insert";

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub claims_path: String,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            claims_path: DEFAULT_CLAIMS_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AttemptOutcome {
    Response {
        status: u16,
        body: String,
        headers: BTreeMap<String, String>,
    },
    Timeout {
        message: String,
    },
    ConnectionFailed {
        message: String,
    },
}

impl AttemptOutcome {
    pub fn observation(&self) -> Observation {
        match self {
            Self::Response { status, .. } => Observation::from_status(*status),
            Self::Timeout { .. } => Observation::Timeout,
            Self::ConnectionFailed { .. } => Observation::ConnectionFailed,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body, or the error text when there was no response.
    pub fn body(&self) -> &str {
        match self {
            Self::Response { body, .. } => body,
            Self::Timeout { message } | Self::ConnectionFailed { message } => message,
        }
    }
}

/// One network attempt, exactly as sent and received.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub kind: AttemptKind,
    pub url: String,
    pub content_type: &'static str,
    pub body: String,
    /// Auth headers with the user key masked
    pub headers: BTreeMap<String, String>,
    pub timestamp: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

/// Receives each attempt as soon as it completes.
#[async_trait]
pub trait AttemptRecorder: Send + Sync {
    async fn record(&self, attempt: &AttemptRecord);
}

/// Recorder that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

#[async_trait]
impl AttemptRecorder for NoopRecorder {
    async fn record(&self, _attempt: &AttemptRecord) {}
}

/// A successful delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub via: AttemptKind,
    pub status: u16,
    pub body: String,
    pub attempts: Vec<AttemptRecord>,
}

impl Delivery {
    /// The clearinghouse answer as JSON, or as a string if it was not JSON.
    pub fn response_json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or_else(|_| Value::String(self.body.clone()))
    }
}

/// Bodies for every encoding, built once per delivery.
struct RequestBodies {
    plain: String,
    form: String,
    json: String,
}

impl RequestBodies {
    fn build(envelope: &ClaimEnvelope) -> Result<Self, TransportError> {
        let plain = envelope
            .request_body()
            .map_err(|e| TransportError::Body(e.to_string()))?;

        // dataMR is url-encoded before form serialization, so it travels
        // encoded twice; the receiver decodes accordingly.
        let mut form = form_urlencoded::Serializer::new(String::new());
        for (name, value) in envelope.form_fields() {
            if name == "dataMR" {
                let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
                form.append_pair(&name, &encoded);
            } else {
                form.append_pair(&name, &value);
            }
        }

        let json = serde_json::to_string(&envelope.json_body())
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(Self {
            plain,
            form: form.finish(),
            json,
        })
    }

    fn for_attempt(&self, kind: AttemptKind) -> &str {
        match kind {
            AttemptKind::Primary | AttemptKind::Retry => &self.plain,
            AttemptKind::FallbackA => &self.form,
            AttemptKind::FallbackB => &self.json,
        }
    }
}

/// Drives one claim through the delivery state machine.
#[derive(Clone)]
pub struct TransportClient {
    http: Client,
    credentials: Arc<Credentials>,
    clock: Arc<dyn Clock>,
    endpoint: String,
}

impl TransportClient {
    pub fn new(credentials: Arc<Credentials>, config: TransportConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        let path = if config.claims_path.starts_with('/') {
            config.claims_path
        } else {
            format!("/{}", config.claims_path)
        };
        let endpoint = format!("{}{}", credentials.base_url, path);

        Ok(Self {
            http,
            credentials,
            clock: Arc::new(SystemClock),
            endpoint,
        })
    }

    /// Replace the signing clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    /// Deliver an envelope, retrying and falling back as the state machine
    /// dictates. Every attempt is handed to `recorder` right after it ends.
    pub async fn deliver(
        &self,
        envelope: &ClaimEnvelope,
        recorder: &dyn AttemptRecorder,
    ) -> Result<Delivery, TransportError> {
        let bodies = RequestBodies::build(envelope)?;
        let episode = envelope.episode_number.as_str();

        let mut state = TransportState::Init;
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut previous: Option<SignedRequest> = None;

        while let Some((kind, sent)) = state.begin() {
            let signed = signer::sign_after(&self.credentials, self.clock.as_ref(), previous.as_ref());
            let attempt = self.send(kind, bodies.for_attempt(kind), &signed).await;
            recorder.record(&attempt).await;

            let observation = attempt.outcome.observation();
            state = sent.on(observation).unwrap_or(TransportState::Failed);

            match &attempt.outcome {
                AttemptOutcome::Response { status, .. } => info!(
                    episode,
                    attempt = %kind,
                    status,
                    elapsed_ms = attempt.elapsed_ms,
                    next = ?state,
                    "Clearinghouse responded"
                ),
                other => warn!(
                    episode,
                    attempt = %kind,
                    error = other.body(),
                    elapsed_ms = attempt.elapsed_ms,
                    next = ?state,
                    "Clearinghouse unreachable"
                ),
            }

            previous = Some(signed);
            attempts.push(attempt);
        }

        let Some(last) = attempts.last() else {
            return Err(TransportError::Client("no attempt was made".to_string()));
        };
        let via = last.kind;
        let last_body = last.outcome.body().to_string();
        let last_status = attempts.iter().rev().find_map(|a| a.outcome.status());

        if state == TransportState::Success {
            return Ok(Delivery {
                via,
                status: last_status.unwrap_or(200),
                body: last_body,
                attempts,
            });
        }

        Err(TransportError::Failed(Box::new(TransportFailure {
            endpoint: self.endpoint.clone(),
            last_status,
            last_body,
            attempts,
        })))
    }

    async fn send(&self, kind: AttemptKind, body: &str, signed: &SignedRequest) -> AttemptRecord {
        let content_type = kind.content_type();
        let mut request = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, content_type)
            .body(body.to_string());

        let mut recorded_headers = BTreeMap::new();
        for (name, value) in signed.headers() {
            let shown = if name == HEADER_USER_KEY {
                "***".to_string()
            } else {
                value.clone()
            };
            recorded_headers.insert(name.to_string(), shown);
            request = request.header(name, value);
        }
        recorded_headers.insert(CONTENT_TYPE.as_str().to_string(), content_type.to_string());

        debug!(
            attempt = %kind,
            timestamp = %signed.timestamp,
            signature = %signed.signature,
            payload_size = body.len(),
            "Sending claim"
        );

        let started = Instant::now();
        let outcome = match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let headers = response
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
                    .collect();
                let body = response.text().await.unwrap_or_default();
                AttemptOutcome::Response {
                    status,
                    body,
                    headers,
                }
            }
            Err(e) if e.is_timeout() => AttemptOutcome::Timeout {
                message: e.to_string(),
            },
            Err(e) => AttemptOutcome::ConnectionFailed {
                message: e.to_string(),
            },
        };

        AttemptRecord {
            kind,
            url: self.endpoint.clone(),
            content_type,
            body: body.to_string(),
            headers: recorded_headers,
            timestamp: signed.timestamp.clone(),
            outcome,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
