use anyhow::Result;
use colored::Colorize;
use serde_json::{Map, Value};

use crate::cli::{AuditArgs, OutputFormat, SubmitArgs};
use crate::client::EclaimClient;
use crate::output::{print_error, print_success, print_value};

pub async fn submit(client: &EclaimClient, args: &SubmitArgs, format: OutputFormat) -> Result<()> {
    let body = super::read_json(&args.file)?;
    let request = build_request(body, args)?;

    let resp = client.submit(&request).await?;
    let message = resp
        .body
        .get("message")
        .or_else(|| resp.body.get("error"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    if resp.body.get("success").and_then(Value::as_bool) == Some(true) {
        let via = resp
            .body
            .get("deliveredVia")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        print_success(&format!("{message} (via {})", via.cyan()));
        print_value(&resp.body, format);
        Ok(())
    } else {
        print_error(&format!("Submission failed (HTTP {})", resp.status));
        print_value(&resp.body, format);
        anyhow::bail!("{message}")
    }
}

/// Accepts a full request (bare or wrapped in `request`) or a bare Bundle.
/// Flags override the matching request fields.
fn build_request(body: Value, args: &SubmitArgs) -> Result<Value> {
    let is_bundle = body.get("resourceType").and_then(|v| v.as_str()) == Some("Bundle");

    let mut request = if is_bundle {
        let mut map = Map::new();
        map.insert("dataMR".into(), body);
        map
    } else {
        match body {
            Value::Object(mut outer) => match outer.remove("request") {
                Some(Value::Object(inner)) => inner,
                Some(other) => {
                    outer.insert("request".into(), other);
                    outer
                }
                None => outer,
            },
            _ => anyhow::bail!("Expected a JSON object or a Bundle"),
        }
    };

    for (field, value) in [
        ("noSep", &args.episode),
        ("jnsPelayanan", &args.service_type),
        ("bulan", &args.month),
        ("tahun", &args.year),
    ] {
        if let Some(v) = value {
            request.insert(field.into(), Value::String(v.clone()));
        }
    }

    if is_bundle {
        let missing: Vec<&str> = ["noSep", "jnsPelayanan", "bulan", "tahun"]
            .into_iter()
            .filter(|f| !request.contains_key(*f))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "A bare Bundle needs --episode, --service-type, --month and --year (missing {})",
                missing.join(", ")
            );
        }
    }

    let mut wrapped = Map::new();
    wrapped.insert("request".into(), Value::Object(request));
    Ok(Value::Object(wrapped))
}

pub async fn audit(client: &EclaimClient, args: &AuditArgs, format: OutputFormat) -> Result<()> {
    let value = client.audit(&args.episode, args.part).await?;
    print_value(&value, format);
    Ok(())
}

pub async fn list(client: &EclaimClient, limit: usize, format: OutputFormat) -> Result<()> {
    let value = client.list(limit).await?;
    print_value(&value, format);
    Ok(())
}

pub async fn settings(client: &EclaimClient, format: OutputFormat) -> Result<()> {
    let value = client.settings().await?;
    if matches!(format, OutputFormat::Table) {
        let text = |v: &Value, key: &str| v.get(key).and_then(|v| v.as_str()).unwrap_or("-").to_string();
        let facility = value.get("facility").cloned().unwrap_or_default();
        let clearinghouse = value.get("clearinghouse").cloned().unwrap_or_default();
        let credentials = clearinghouse.get("credentials").cloned().unwrap_or_default();

        println!("{}: {}", "Facility".cyan(), text(&facility, "name"));
        println!("{}: {}", "Facility code".cyan(), text(&facility, "facilityCode"));
        println!("{}: {}", "Ministry code".cyan(), text(&facility, "ministryCode"));
        println!("{}: {}", "Endpoint".cyan(), text(&clearinghouse, "endpoint"));
        println!("{}: {}", "Consumer ID".cyan(), text(&credentials, "consumerId"));
    } else {
        print_value(&value, format);
    }
    Ok(())
}

pub async fn status(client: &EclaimClient, server: &str) -> Result<()> {
    let (code, body) = client.health().await?;
    if code == 200 {
        println!("{} {} is {}", "✓".green(), server.cyan(), "healthy".green());
        if !body.is_empty() {
            println!("  {body}");
        }
    } else {
        println!(
            "{} {} returned {} {}",
            "✗".red(),
            server.cyan(),
            code.to_string().red(),
            body
        );
    }
    Ok(())
}
