//! Delivery state machine against a fake clearinghouse.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eclaim_core::{
    BillingPeriod, ClaimEnvelope, Credentials, ManualClock, ResolvedServiceType, ServiceType,
};
use eclaim_transport::{
    AttemptKind, AttemptRecord, AttemptRecorder, NoopRecorder, TransportClient, TransportConfig,
    TransportError,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const CLAIMS_PATH: &str = "/medicalrecord/eclaim/rekammedis/insert";
const T0: u64 = 1_700_000_000;

const PLAIN: &str = "text/plain";
const FORM: &str = "application/x-www-form-urlencoded";
const JSON: &str = "application/json";

#[derive(Default)]
struct CollectingRecorder {
    attempts: Mutex<Vec<AttemptRecord>>,
}

#[async_trait]
impl AttemptRecorder for CollectingRecorder {
    async fn record(&self, attempt: &AttemptRecord) {
        self.attempts.lock().unwrap().push(attempt.clone());
    }
}

fn client(server: &MockServer, timeout: Duration) -> TransportClient {
    let creds = Arc::new(Credentials::new("1234", "secret", "0301R001", "uk", server.uri()));
    TransportClient::new(
        creds,
        TransportConfig {
            claims_path: CLAIMS_PATH.to_string(),
            timeout,
        },
    )
    .unwrap()
    .with_clock(Arc::new(ManualClock::new(T0)))
}

fn envelope() -> ClaimEnvelope {
    ClaimEnvelope {
        episode_number: "0301R0010124V000001".into(),
        service_type: ResolvedServiceType::Known(ServiceType::Inpatient),
        period: BillingPeriod {
            month: json!("01"),
            year: json!("2024"),
        },
        encrypted_payload: "c2VhbGVk".into(),
    }
}

async fn respond(server: &MockServer, content_type: &str, status: u16, times: Option<u64>) {
    let mock = Mock::given(method("POST"))
        .and(path(CLAIMS_PATH))
        .and(header("content-type", content_type))
        .respond_with(ResponseTemplate::new(status).set_body_string(format!("{{\"code\":{status}}}")));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

fn header_of(request: &Request, name: &str) -> String {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn received(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn primary_success_makes_one_attempt() {
    let server = MockServer::start().await;
    respond(&server, PLAIN, 200, None).await;

    let delivery = client(&server, Duration::from_secs(5))
        .deliver(&envelope(), &NoopRecorder)
        .await
        .unwrap();

    assert_eq!(delivery.via, AttemptKind::Primary);
    assert_eq!(delivery.response_json(), json!({"code": 200}));

    let requests = received(&server).await;
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["request"]["dataMR"], json!("c2VhbGVk"));
    assert_eq!(body["request"]["jnsPelayanan"], json!("1"));
    assert_eq!(header_of(&requests[0], "x-cons-id"), "1234");
    assert_eq!(header_of(&requests[0], "user_key"), "uk");
    assert_eq!(header_of(&requests[0], "x-timestamp"), T0.to_string());
}

#[tokio::test]
async fn unauthorized_primary_is_retried_once_with_a_later_timestamp() {
    let server = MockServer::start().await;
    respond(&server, PLAIN, 401, Some(1)).await;
    respond(&server, PLAIN, 200, None).await;

    let delivery = client(&server, Duration::from_secs(5))
        .deliver(&envelope(), &NoopRecorder)
        .await
        .unwrap();
    assert_eq!(delivery.via, AttemptKind::Retry);

    let requests = received(&server).await;
    assert_eq!(requests.len(), 2);
    let first: u64 = header_of(&requests[0], "x-timestamp").parse().unwrap();
    let second: u64 = header_of(&requests[1], "x-timestamp").parse().unwrap();
    assert!(second > first);
    assert_ne!(
        header_of(&requests[0], "x-signature"),
        header_of(&requests[1], "x-signature")
    );
    assert_eq!(requests[0].body, requests[1].body);
}

#[tokio::test]
async fn bad_request_after_retry_goes_to_form_then_json() {
    let server = MockServer::start().await;
    respond(&server, PLAIN, 401, Some(1)).await;
    respond(&server, PLAIN, 400, None).await;
    respond(&server, FORM, 400, None).await;
    respond(&server, JSON, 200, None).await;

    let recorder = CollectingRecorder::default();
    let delivery = client(&server, Duration::from_secs(5))
        .deliver(&envelope(), &recorder)
        .await
        .unwrap();
    assert_eq!(delivery.via, AttemptKind::FallbackB);

    let kinds: Vec<AttemptKind> = recorder.attempts.lock().unwrap().iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AttemptKind::Primary,
            AttemptKind::Retry,
            AttemptKind::FallbackA,
            AttemptKind::FallbackB
        ]
    );

    let requests = received(&server).await;
    let content_types: Vec<String> = requests.iter().map(|r| header_of(r, "content-type")).collect();
    assert_eq!(content_types, vec![PLAIN, PLAIN, FORM, JSON]);

    let timestamps: Vec<u64> = requests
        .iter()
        .map(|r| header_of(r, "x-timestamp").parse().unwrap())
        .collect();
    assert!(timestamps.windows(2).all(|w| w[1] > w[0]));

    let form = String::from_utf8(requests[2].body.clone()).unwrap();
    assert!(form.starts_with("noSep=0301R0010124V000001&jnsPelayanan=1&bulan=01&tahun=2024&dataMR="));

    let json_body: serde_json::Value = serde_json::from_slice(&requests[3].body).unwrap();
    assert_eq!(json_body["dataMR"], json!("YzJWaGJHVms="));
}

#[tokio::test]
async fn bad_request_at_primary_skips_the_retry() {
    let server = MockServer::start().await;
    respond(&server, PLAIN, 400, None).await;
    respond(&server, FORM, 200, None).await;

    let delivery = client(&server, Duration::from_secs(5))
        .deliver(&envelope(), &NoopRecorder)
        .await
        .unwrap();

    assert_eq!(delivery.via, AttemptKind::FallbackA);
    assert_eq!(received(&server).await.len(), 2);
}

#[tokio::test]
async fn timeout_advances_to_fallback_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", PLAIN))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(600)))
        .mount(&server)
        .await;
    respond(&server, FORM, 200, None).await;

    let recorder = CollectingRecorder::default();
    let delivery = client(&server, Duration::from_millis(150))
        .deliver(&envelope(), &recorder)
        .await
        .unwrap();

    assert_eq!(delivery.via, AttemptKind::FallbackA);
    let attempts = recorder.attempts.lock().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].kind, AttemptKind::Primary);
    assert_eq!(attempts[0].outcome.status(), None);
    assert_eq!(attempts[1].kind, AttemptKind::FallbackA);
}

#[tokio::test]
async fn server_error_at_primary_fails_immediately() {
    let server = MockServer::start().await;
    respond(&server, PLAIN, 500, None).await;

    let err = client(&server, Duration::from_secs(5))
        .deliver(&envelope(), &NoopRecorder)
        .await
        .unwrap_err();

    let failure = err.failure().unwrap();
    assert_eq!(failure.last_status, Some(500));
    assert_eq!(failure.attempts.len(), 1);
}

#[tokio::test]
async fn exhausting_every_encoding_reports_full_context() {
    let server = MockServer::start().await;
    respond(&server, PLAIN, 401, None).await;
    respond(&server, FORM, 401, None).await;
    respond(&server, JSON, 400, None).await;

    let err = client(&server, Duration::from_secs(5))
        .deliver(&envelope(), &NoopRecorder)
        .await
        .unwrap_err();

    let TransportError::Failed(failure) = &err else {
        panic!("expected a delivery failure, got {err:?}");
    };
    assert_eq!(failure.last_status, Some(400));
    assert_eq!(failure.last_body, "{\"code\":400}");
    assert_eq!(failure.attempts.len(), 4);
    assert!(failure.endpoint.ends_with(CLAIMS_PATH));

    for (i, attempt) in failure.attempts.iter().enumerate() {
        assert_eq!(attempt.timestamp, (T0 + i as u64).to_string());
        assert_eq!(attempt.headers["X-timestamp"], attempt.timestamp);
        assert_eq!(attempt.headers["user_key"], "***");
    }
    assert_eq!(received(&server).await.len(), 4);
}

#[tokio::test]
async fn unreachable_clearinghouse_fails_with_no_status() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let creds = Arc::new(Credentials::new("1234", "secret", "0301R001", "uk", uri));
    let client = TransportClient::new(creds, TransportConfig::default())
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(T0)));

    let err = client.deliver(&envelope(), &NoopRecorder).await.unwrap_err();
    let failure = err.failure().unwrap();
    assert_eq!(failure.last_status, None);
    // Connection failures skip the retry: primary, fallback A, fallback B.
    assert_eq!(failure.attempts.len(), 3);
}
