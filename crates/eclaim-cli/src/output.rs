use crate::cli::OutputFormat;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

const STAGES: [(&str, &str); 5] = [
    ("intake", "intake"),
    ("primaryAttempt", "primary"),
    ("retryAttempt", "retry"),
    ("fallbackAAttempt", "fallbackA"),
    ("fallbackBAttempt", "fallbackB"),
];

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", pretty(value)),
        OutputFormat::Table => print_as_table(value),
    }
}

pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

fn print_as_table(value: &Value) {
    if let Some(records) = value.get("records").and_then(|v| v.as_array()) {
        if records.is_empty() {
            println!("No audit records found.");
            return;
        }
        println!("{}", records_table(records));
        return;
    }

    if value.get("episodeNumber").is_some() && value.get("intake").is_some() {
        println!("{}", records_table(std::slice::from_ref(value)));
        return;
    }

    // Anything else: top-level scalars as key/value rows
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    if let Some(obj) = value.as_object() {
        for (k, v) in obj {
            let shown = match v {
                Value::String(s) => s.clone(),
                Value::Object(_) | Value::Array(_) => "…".to_string(),
                other => other.to_string(),
            };
            builder.push_record([k.as_str(), shown.as_str()]);
        }
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn records_table(records: &[Value]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Episode", "Stages", "Last status", "Updated"]);
    for record in records {
        let episode = record
            .get("episodeNumber")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let stages: Vec<&str> = STAGES
            .iter()
            .filter(|(key, _)| record.get(*key).is_some_and(|s| !s.is_null()))
            .map(|(_, label)| *label)
            .collect();
        let last_status = STAGES
            .iter()
            .rev()
            .filter_map(|(key, _)| record.get(*key))
            .find_map(|stage| stage.get("response")?.get("status")?.as_u64())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let updated = record
            .get("updatedAt")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        builder.push_record([
            episode,
            stages.join(", ").as_str(),
            last_status.as_str(),
            updated,
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}
