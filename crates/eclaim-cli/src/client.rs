use anyhow::{Context, Result};
use serde_json::Value;

use crate::cli::AuditPart;

pub struct EclaimClient {
    http: reqwest::Client,
    base_url: String,
}

/// Status and JSON body of a submission, successful or not.
pub struct SubmitResponse {
    pub status: u16,
    pub body: Value,
}

impl EclaimClient {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn claims_url(&self, path: &str) -> String {
        format!("{}/claims/{}", self.base_url, path)
    }

    /// Submits a claim. Failures answered by the server come back as a
    /// response; only transport problems are errors.
    pub async fn submit(&self, request: &Value) -> Result<SubmitResponse> {
        let url = self.claims_url("medical-records");
        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "text/plain")
            .body(request.to_string())
            .send()
            .await
            .context("Failed to connect to server")?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(SubmitResponse { status, body })
    }

    pub async fn audit(&self, episode: &str, part: AuditPart) -> Result<Value> {
        let path = match part {
            AuditPart::Record => format!("medical-records/{episode}"),
            AuditPart::Bundle => format!("medical-records/{episode}/bundle"),
            AuditPart::Response => format!("medical-records/{episode}/response"),
        };
        let resp = self
            .http
            .get(self.claims_url(&path))
            .send()
            .await
            .context("Failed to connect to server")?;
        handle_response(resp).await
    }

    pub async fn list(&self, limit: usize) -> Result<Value> {
        let resp = self
            .http
            .get(self.claims_url("medical-records"))
            .query(&[("limit", limit)])
            .send()
            .await
            .context("Failed to connect to server")?;
        handle_response(resp).await
    }

    pub async fn settings(&self) -> Result<Value> {
        let resp = self
            .http
            .get(self.claims_url("settings"))
            .send()
            .await
            .context("Failed to connect to server")?;
        handle_response(resp).await
    }

    pub async fn health(&self) -> Result<(u16, String)> {
        let url = format!("{}/healthz", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to connect to server")?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok((status, body))
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        if let Ok(json) = serde_json::from_str::<Value>(&body)
            && let Some(message) = json.get("error").and_then(|v| v.as_str())
        {
            anyhow::bail!("HTTP {status}: {message}");
        }
        anyhow::bail!("HTTP {status}: {body}");
    }

    if body.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).context("Failed to parse response JSON")
}
