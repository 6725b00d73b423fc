//! Claim submission types: the inbound request, its validated form and the
//! sealed envelope handed to the transport.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Substring of the local classification that marks an inpatient episode.
const INPATIENT_MARKER: &str = "rawat inap";

/// Service type as understood by the clearinghouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Inpatient,
    Outpatient,
}

impl ServiceType {
    /// Wire code (`jnsPelayanan`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Inpatient => "1",
            Self::Outpatient => "2",
        }
    }

    /// Interpret a caller-supplied value: `"1"`, `1`, `"inpatient"` or
    /// `"2"`, `2`, `"outpatient"`, matched exactly. Anything else is
    /// unresolved.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(Self::Inpatient),
                Some(2) => Some(Self::Outpatient),
                _ => None,
            },
            Value::String(s) => match s.as_str() {
                "1" | "inpatient" => Some(Self::Inpatient),
                "2" | "outpatient" => Some(Self::Outpatient),
                _ => None,
            },
            _ => None,
        }
    }

    /// Map the local registry's free-text classification.
    pub fn from_classification(classification: &str) -> Self {
        if classification.to_lowercase().contains(INPATIENT_MARKER) {
            Self::Inpatient
        } else {
            Self::Outpatient
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inpatient => write!(f, "inpatient"),
            Self::Outpatient => write!(f, "outpatient"),
        }
    }
}

/// Outcome of service-type resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedServiceType {
    Known(ServiceType),
    /// Nothing resolved it; the caller's value is sent as given.
    Unresolved(Value),
}

impl ResolvedServiceType {
    /// Value placed in `jnsPelayanan`.
    pub fn wire_value(&self) -> Value {
        match self {
            Self::Known(t) => Value::String(t.code().to_string()),
            Self::Unresolved(raw) => raw.clone(),
        }
    }

    pub fn known(&self) -> Option<ServiceType> {
        match self {
            Self::Known(t) => Some(*t),
            Self::Unresolved(_) => None,
        }
    }
}

/// Billing month and year, passed through exactly as the caller sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub month: Value,
    pub year: Value,
}

/// Inbound submission as received over the wire.
///
/// Field names follow the clearinghouse (`noSep`, `jnsPelayanan`, `bulan`,
/// `tahun`, `dataMR`); descriptive camelCase aliases are accepted too.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionRequest {
    #[serde(rename = "noSep", alias = "episodeNumber", default)]
    pub no_sep: Option<Value>,
    #[serde(rename = "jnsPelayanan", alias = "serviceType", default)]
    pub jns_pelayanan: Option<Value>,
    #[serde(rename = "bulan", alias = "billingMonth", default)]
    pub bulan: Option<Value>,
    #[serde(rename = "tahun", alias = "billingYear", default)]
    pub tahun: Option<Value>,
    #[serde(rename = "dataMR", alias = "bundle", default)]
    pub data_mr: Option<Value>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub episode_number: String,
    /// Caller's service type before resolution
    pub service_type: Value,
    pub period: BillingPeriod,
    /// Raw, pre-normalization bundle
    pub bundle: Value,
}

impl SubmissionRequest {
    /// Parse a request body, unwrapping an optional `{"request": {...}}`.
    pub fn from_json(body: Value) -> Result<Self> {
        let body = match body {
            Value::Object(mut map)
                if !map.contains_key("noSep")
                    && !map.contains_key("episodeNumber")
                    && map.get("request").is_some_and(Value::is_object) =>
            {
                map.remove("request").unwrap_or_default()
            }
            other => other,
        };

        if !body.is_object() {
            return Err(CoreError::invalid_field(
                "request",
                "expected a JSON object",
            ));
        }
        serde_json::from_value(body)
            .map_err(|e| CoreError::invalid_field("request", e.to_string()))
    }

    /// Check every required field, reporting all missing ones at once.
    pub fn validate(self) -> Result<Submission> {
        let mut missing = Vec::new();
        if is_blank(&self.no_sep) {
            missing.push("noSep");
        }
        if is_blank(&self.jns_pelayanan) {
            missing.push("jnsPelayanan");
        }
        if is_blank(&self.bulan) {
            missing.push("bulan");
        }
        if is_blank(&self.tahun) {
            missing.push("tahun");
        }
        if is_blank(&self.data_mr) {
            missing.push("dataMR");
        }
        if !missing.is_empty() {
            return Err(CoreError::missing_fields(missing));
        }

        let (Some(no_sep), Some(service_type), Some(month), Some(year), Some(data_mr)) = (
            self.no_sep,
            self.jns_pelayanan,
            self.bulan,
            self.tahun,
            self.data_mr,
        ) else {
            return Err(CoreError::missing_fields(vec!["noSep"]));
        };

        let episode_number = match no_sep {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(CoreError::invalid_field(
                    "noSep",
                    "expected a string or number",
                ));
            }
        };

        let bundle = match data_mr {
            Value::String(text) => serde_json::from_str::<Value>(&text).map_err(|e| {
                CoreError::invalid_field("dataMR", format!("not valid JSON: {e}"))
            })?,
            other => other,
        };
        if !bundle.is_object() {
            return Err(CoreError::invalid_field(
                "dataMR",
                "expected a bundle object",
            ));
        }

        Ok(Submission {
            episode_number,
            service_type,
            period: BillingPeriod { month, year },
            bundle,
        })
    }
}

fn is_blank(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Sealed claim ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimEnvelope {
    pub episode_number: String,
    pub service_type: ResolvedServiceType,
    pub period: BillingPeriod,
    /// Base64 AES ciphertext
    pub encrypted_payload: String,
}

impl ClaimEnvelope {
    fn fields(&self, data_mr: Value) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("noSep".into(), Value::String(self.episode_number.clone()));
        fields.insert("jnsPelayanan".into(), self.service_type.wire_value());
        fields.insert("bulan".into(), self.period.month.clone());
        fields.insert("tahun".into(), self.period.year.clone());
        fields.insert("dataMR".into(), data_mr);
        fields
    }

    /// Primary/retry body: `{"request":{...,"dataMR":cipherBase64}}`.
    pub fn request_body(&self) -> Result<String> {
        let mut body = Map::new();
        body.insert(
            "request".into(),
            Value::Object(self.fields(Value::String(self.encrypted_payload.clone()))),
        );
        Ok(serde_json::to_string(&Value::Object(body))?)
    }

    /// Ciphertext base64-encoded once more, as both fallbacks carry it.
    pub fn rewrapped_payload(&self) -> String {
        use base64::{Engine, engine::general_purpose::STANDARD};
        STANDARD.encode(self.encrypted_payload.as_bytes())
    }

    /// Fallback A form fields, unencoded; the transport url-encodes them.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.fields(Value::String(self.rewrapped_payload()))
            .into_iter()
            .map(|(k, v)| (k, scalar_text(&v)))
            .collect()
    }

    /// Fallback B JSON body.
    pub fn json_body(&self) -> Value {
        Value::Object(self.fields(Value::String(self.rewrapped_payload())))
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
