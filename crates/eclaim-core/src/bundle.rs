//! Structural repair of clinical bundles before sealing.
//!
//! The receiver's parser distinguishes JSON arrays from JSON objects strictly:
//! a repeatable field that arrives as a bare object is rejected, and
//! `Composition.section` must arrive as an object keyed `"1".."n"`. Upstream
//! record assembly does not guarantee either shape, so every bundle goes
//! through [`BundleNormalizer`] first.
//!
//! Normalization is best-effort: it never fails, it is idempotent, and
//! anything it does not recognize is passed through and reported as a
//! [`NormalizationWarning`].

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

/// Repeatable (0..N) fields per resource type.
pub const DEFAULT_REPEATABLE_FIELDS: &[(&str, &[&str])] = &[
    (
        "Patient",
        &["identifier", "name", "telecom", "address", "communication"],
    ),
    (
        "Encounter",
        &[
            "identifier",
            "type",
            "participant",
            "diagnosis",
            "reason",
            "serviceProvider",
            "incomingReferral",
            "hospitalization",
        ],
    ),
    ("Composition", &["author", "attester", "custodian", "event"]),
    (
        "Organization",
        &["identifier", "type", "alias", "telecom", "address", "contact"],
    ),
    (
        "Practitioner",
        &[
            "identifier",
            "name",
            "telecom",
            "address",
            "qualification",
            "communication",
        ],
    ),
    ("Condition", &["category", "bodySite", "stage", "evidence"]),
    ("Procedure", &["performer", "bodySite", "reasonCode", "note"]),
    (
        "MedicationRequest",
        &["identifier", "dosageInstruction", "note"],
    ),
];

/// Non-fatal findings collected while normalizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationWarning {
    /// The input was not a JSON object; it is passed through untouched.
    NotABundle,
    /// `entry` was neither an array nor a keyed object.
    MalformedEntryList,
    /// An entry was removed because it carried no usable resource.
    DroppedEntry { index: usize, reason: &'static str },
    /// A resource without a `resourceType` discriminator.
    MissingResourceType { index: usize },
    /// A resource type with no repeatable-field table; passed through.
    UnknownResourceType { index: usize, resource_type: String },
}

impl fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotABundle => write!(f, "bundle is not a JSON object"),
            Self::MalformedEntryList => write!(f, "bundle entry is neither an array nor an object"),
            Self::DroppedEntry { index, reason } => write!(f, "entry {index} dropped: {reason}"),
            Self::MissingResourceType { index } => {
                write!(f, "entry {index}: resource has no resourceType")
            }
            Self::UnknownResourceType {
                index,
                resource_type,
            } => write!(f, "entry {index}: unrecognized resource type {resource_type}"),
        }
    }
}

/// Counters and warnings from one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    pub entries_before: usize,
    pub entries_after: usize,
    pub wrapped_fields: usize,
    pub sections_rekeyed: usize,
    pub null_texts_fixed: usize,
    pub warnings: Vec<NormalizationWarning>,
}

impl NormalizationReport {
    pub fn dropped_entries(&self) -> usize {
        self.entries_before.saturating_sub(self.entries_after)
    }

    fn warn(&mut self, warning: NormalizationWarning) {
        self.warnings.push(warning);
    }
}

/// Table-driven bundle normalizer.
///
/// Adding a resource type is a data change:
///
/// ```
/// use eclaim_core::BundleNormalizer;
///
/// let normalizer = BundleNormalizer::new()
///     .with_repeatable_fields("Observation", ["category", "performer"]);
/// assert!(normalizer.repeatable_fields("Observation").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct BundleNormalizer {
    repeatable: HashMap<String, Vec<String>>,
}

impl Default for BundleNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleNormalizer {
    /// Normalizer with the default repeatable-field table.
    pub fn new() -> Self {
        let repeatable = DEFAULT_REPEATABLE_FIELDS
            .iter()
            .map(|(resource_type, fields)| {
                (
                    (*resource_type).to_string(),
                    fields.iter().map(|f| (*f).to_string()).collect(),
                )
            })
            .collect();
        Self { repeatable }
    }

    /// Normalizer with an empty table. Only entry filtering, section
    /// re-keying and null-text repair apply.
    pub fn empty() -> Self {
        Self {
            repeatable: HashMap::new(),
        }
    }

    /// Register (or extend) the repeatable fields of a resource type.
    pub fn with_repeatable_fields<I, S>(mut self, resource_type: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.repeatable.entry(resource_type.to_string()).or_default();
        for field in fields {
            let field = field.into();
            if !entry.contains(&field) {
                entry.push(field);
            }
        }
        self
    }

    pub fn repeatable_fields(&self, resource_type: &str) -> Option<&[String]> {
        self.repeatable.get(resource_type).map(Vec::as_slice)
    }

    pub fn normalize(&self, bundle: &Value) -> Value {
        self.normalize_with_report(bundle).0
    }

    pub fn normalize_with_report(&self, bundle: &Value) -> (Value, NormalizationReport) {
        let mut report = NormalizationReport::default();
        let mut normalized = bundle.clone();

        match &mut normalized {
            Value::Object(root) => {
                if let Some(entries) = root.get_mut("entry") {
                    let taken = entries.take();
                    *entries = self.normalize_entries(taken, &mut report);
                }
            }
            _ => report.warn(NormalizationWarning::NotABundle),
        }

        report.null_texts_fixed = fix_null_texts(&mut normalized);

        for warning in &report.warnings {
            match warning {
                NormalizationWarning::UnknownResourceType { .. } => {
                    tracing::debug!(warning = %warning, "normalization passed resource through");
                }
                _ => tracing::warn!(warning = %warning, "normalization warning"),
            }
        }
        tracing::debug!(
            entries_before = report.entries_before,
            entries_after = report.entries_after,
            wrapped_fields = report.wrapped_fields,
            sections_rekeyed = report.sections_rekeyed,
            null_texts_fixed = report.null_texts_fixed,
            "bundle normalized"
        );

        (normalized, report)
    }

    fn normalize_entries(&self, entries: Value, report: &mut NormalizationReport) -> Value {
        let items: Vec<Value> = match entries {
            Value::Array(items) => items,
            // Keyed entry maps are read back as a sequence in their original order.
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            other => {
                report.warn(NormalizationWarning::MalformedEntryList);
                return other;
            }
        };

        report.entries_before = items.len();
        let mut kept = Vec::with_capacity(items.len());

        for (index, mut entry) in items.into_iter().enumerate() {
            let Some(entry_map) = entry.as_object_mut() else {
                report.warn(NormalizationWarning::DroppedEntry {
                    index,
                    reason: "entry is not an object",
                });
                continue;
            };
            let Some(resource) = entry_map.get_mut("resource") else {
                report.warn(NormalizationWarning::DroppedEntry {
                    index,
                    reason: "missing resource",
                });
                continue;
            };
            if is_empty_resource(resource) {
                report.warn(NormalizationWarning::DroppedEntry {
                    index,
                    reason: "resource is null or empty",
                });
                continue;
            }

            match resource {
                Value::Object(map) => self.normalize_resource(index, map, report),
                // Some producers wrap several resources of one kind in a single entry.
                Value::Array(resources) => {
                    for item in resources.iter_mut() {
                        if let Value::Object(map) = item {
                            self.normalize_resource(index, map, report);
                        }
                    }
                }
                _ => {}
            }

            kept.push(entry);
        }

        report.entries_after = kept.len();
        Value::Array(kept)
    }

    fn normalize_resource(
        &self,
        index: usize,
        resource: &mut Map<String, Value>,
        report: &mut NormalizationReport,
    ) {
        let Some(resource_type) = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            report.warn(NormalizationWarning::MissingResourceType { index });
            return;
        };

        if resource_type == "Composition"
            && let Some(section) = resource.get_mut("section")
            && !section.is_null()
        {
            let taken = section.take();
            *section = rekey_sections(taken);
            report.sections_rekeyed += 1;
        }

        let Some(fields) = self.repeatable.get(&resource_type) else {
            report.warn(NormalizationWarning::UnknownResourceType {
                index,
                resource_type,
            });
            return;
        };

        for field in fields {
            if let Some(value) = resource.get_mut(field.as_str())
                && !value.is_array()
                && !value.is_null()
            {
                let single = value.take();
                *value = Value::Array(vec![single]);
                report.wrapped_fields += 1;
            }
        }
    }
}

fn is_empty_resource(resource: &Value) -> bool {
    match resource {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Re-key `Composition.section` as `{"1": .., "2": .., ..}` ordered by the
/// numeric value of the original keys. Non-numeric keys sort last, keeping
/// their relative order.
fn rekey_sections(section: Value) -> Value {
    let mut pairs: Vec<(Option<NumericKey>, Value)> = match section {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (NumericKey::parse(&key), value))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, value)| (NumericKey::parse(&i.to_string()), value))
            .collect(),
        other => vec![(NumericKey::parse("0"), other)],
    };

    pairs.sort_by(|(a, _), (b, _)| (a.is_none(), a).cmp(&(b.is_none(), b)));

    let rekeyed: Map<String, Value> = pairs
        .into_iter()
        .enumerate()
        .map(|(i, (_, value))| ((i + 1).to_string(), value))
        .collect();
    Value::Object(rekeyed)
}

/// An unsigned integer key of any length, ordered by value.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct NumericKey {
    len: usize,
    digits: String,
}

impl NumericKey {
    fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let digits = key.trim_start_matches('0');
        Some(Self {
            len: digits.len(),
            digits: digits.to_string(),
        })
    }
}

/// Replace every `"text": null` in the tree with `"text": ""`.
fn fix_null_texts(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => map
            .iter_mut()
            .map(|(key, child)| {
                if key == "text" && child.is_null() {
                    *child = Value::String(String::new());
                    1
                } else {
                    fix_null_texts(child)
                }
            })
            .sum(),
        Value::Array(items) => items.iter_mut().map(fix_null_texts).sum(),
        _ => 0,
    }
}

/// True when no `text` key anywhere in the tree holds `null`.
pub fn has_no_null_text(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .all(|(key, child)| !(key == "text" && child.is_null()) && has_no_null_text(child)),
        Value::Array(items) => items.iter().all(has_no_null_text),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn sample_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "document",
            "entry": [
                {"resource": {
                    "resourceType": "Composition",
                    "author": {"reference": "Practitioner/1"},
                    "section": {
                        "30": {"title": "Plan", "text": {"status": "generated", "div": null}},
                        "10": {"title": "Anamnesis"},
                        "20": {"title": "Diagnosis", "text": null}
                    }
                }},
                {"resource": {
                    "resourceType": "Patient",
                    "name": {"family": "Siti", "given": ["Aminah"]},
                    "identifier": [{"system": "nik", "value": "3326"}],
                    "gender": "female"
                }},
                {"resource": null},
                {"fullUrl": "urn:uuid:missing"},
                {"resource": {}},
                {"resource": [
                    {"resourceType": "Procedure", "performer": {"actor": {"reference": "Practitioner/1"}},
                     "note": [{"text": null}]},
                    {"resourceType": "Procedure", "note": [{"text": "ok"}]}
                ]},
                {"resource": {"resourceType": "DeviceUseStatement", "device": {"reference": "Device/1"}}}
            ]
        })
    }

    #[test]
    fn normalize_is_idempotent() {
        let normalizer = BundleNormalizer::new();
        let once = normalizer.normalize(&sample_bundle());
        let twice = normalizer.normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn drops_entries_without_resource() {
        let (normalized, report) = BundleNormalizer::new().normalize_with_report(&sample_bundle());
        assert_eq!(normalized["entry"].as_array().unwrap().len(), 4);
        assert_eq!(report.entries_before, 7);
        assert_eq!(report.entries_after, 4);
        assert_eq!(report.dropped_entries(), 3);
    }

    #[test]
    fn wraps_repeatable_fields_in_arrays() {
        let normalized = BundleNormalizer::new().normalize(&sample_bundle());
        let patient = &normalized["entry"][1]["resource"];
        assert_json_eq!(patient["name"], json!([{"family": "Siti", "given": ["Aminah"]}]));
        // Already a sequence: untouched.
        assert_json_eq!(patient["identifier"], json!([{"system": "nik", "value": "3326"}]));
        // Not repeatable: untouched.
        assert_eq!(patient["gender"], "female");

        let composition = &normalized["entry"][0]["resource"];
        assert_json_eq!(composition["author"], json!([{"reference": "Practitioner/1"}]));
    }

    #[test]
    fn every_declared_repeatable_field_is_a_sequence() {
        let normalizer = BundleNormalizer::new();
        let normalized = normalizer.normalize(&sample_bundle());
        for entry in normalized["entry"].as_array().unwrap() {
            let resources: Vec<&Value> = match &entry["resource"] {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for resource in resources {
                let Some(rt) = resource["resourceType"].as_str() else { continue };
                for field in normalizer.repeatable_fields(rt).unwrap_or_default() {
                    if let Some(value) = resource.get(field) {
                        assert!(value.is_array(), "{rt}.{field} should be an array");
                    }
                }
            }
        }
    }

    #[test]
    fn composition_sections_are_rekeyed_by_numeric_order() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {
                "resourceType": "Composition",
                "section": {"30": {"title": "c"}, "10": {"title": "a"}, "20": {"title": "b"}}
            }}]
        });
        let normalized = BundleNormalizer::new().normalize(&bundle);
        let section = normalized["entry"][0]["resource"]["section"].as_object().unwrap();
        let keys: Vec<&str> = section.keys().map(String::as_str).collect();
        assert_eq!(keys, ["1", "2", "3"]);
        assert_eq!(section["1"]["title"], "a");
        assert_eq!(section["2"]["title"], "b");
        assert_eq!(section["3"]["title"], "c");
    }

    #[test]
    fn composition_section_array_becomes_keyed_map() {
        let bundle = json!({
            "entry": [{"resource": {
                "resourceType": "Composition",
                "section": [{"title": "first"}, {"title": "second"}]
            }}]
        });
        let normalized = BundleNormalizer::new().normalize(&bundle);
        let section = &normalized["entry"][0]["resource"]["section"];
        assert!(section.is_object());
        assert_eq!(section["1"]["title"], "first");
        assert_eq!(section["2"]["title"], "second");
    }

    #[test]
    fn more_than_nine_sections_keep_numeric_order() {
        let mut sections = Map::new();
        for i in (1..=12).rev() {
            sections.insert((i * 10).to_string(), json!({"n": i}));
        }
        let bundle = json!({
            "entry": [{"resource": {"resourceType": "Composition", "section": sections}}]
        });
        let normalized = BundleNormalizer::new().normalize(&bundle);
        let section = normalized["entry"][0]["resource"]["section"].as_object().unwrap();
        let order: Vec<i64> = section.values().map(|v| v["n"].as_i64().unwrap()).collect();
        assert_eq!(order, (1..=12).collect::<Vec<i64>>());
        assert_eq!(section.keys().last().map(String::as_str), Some("12"));
    }

    #[test]
    fn section_keys_beyond_machine_integers_sort_by_value() {
        let bundle = json!({
            "entry": [{"resource": {
                "resourceType": "Composition",
                "section": {
                    "20000000000000000000": {"title": "b"},
                    "10000000000000000000": {"title": "a"},
                    "notes": {"title": "z"},
                    "007": {"title": "first"}
                }
            }}]
        });
        let normalized = BundleNormalizer::new().normalize(&bundle);
        let section = &normalized["entry"][0]["resource"]["section"];
        assert_eq!(section["1"]["title"], "first");
        assert_eq!(section["2"]["title"], "a");
        assert_eq!(section["3"]["title"], "b");
        assert_eq!(section["4"]["title"], "z");
    }

    #[test]
    fn null_text_is_replaced_everywhere() {
        let normalized = BundleNormalizer::new().normalize(&sample_bundle());
        assert!(has_no_null_text(&normalized));
        let procedure = &normalized["entry"][2]["resource"][0];
        assert_eq!(procedure["note"][0]["text"], "");
        let section = &normalized["entry"][0]["resource"]["section"];
        assert_eq!(section["2"]["text"], "");
        // Only keys named `text` are rewritten.
        assert!(section["3"]["text"]["div"].is_null());
    }

    #[test]
    fn array_wrapped_resources_are_normalized_individually() {
        let normalized = BundleNormalizer::new().normalize(&sample_bundle());
        let procedures = normalized["entry"][2]["resource"].as_array().unwrap();
        assert!(procedures[0]["performer"].is_array());
        assert_eq!(procedures[1]["note"][0]["text"], "ok");
    }

    #[test]
    fn unknown_resource_types_pass_through() {
        let (normalized, report) = BundleNormalizer::new().normalize_with_report(&sample_bundle());
        assert_json_eq!(
            normalized["entry"][3]["resource"],
            json!({"resourceType": "DeviceUseStatement", "device": {"reference": "Device/1"}})
        );
        assert!(report.warnings.contains(&NormalizationWarning::UnknownResourceType {
            index: 6,
            resource_type: "DeviceUseStatement".to_string(),
        }));
    }

    #[test]
    fn registered_resource_type_is_normalized() {
        let normalizer = BundleNormalizer::new().with_repeatable_fields("DeviceUseStatement", ["device"]);
        let normalized = normalizer.normalize(&sample_bundle());
        assert!(normalized["entry"][3]["resource"]["device"].is_array());
    }

    #[test]
    fn keyed_entry_map_is_read_as_sequence() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": {
                "a": {"resource": {"resourceType": "Patient", "name": {"family": "A"}}},
                "b": {"resource": {"resourceType": "Patient", "name": {"family": "B"}}}
            }
        });
        let normalized = BundleNormalizer::new().normalize(&bundle);
        let entries = normalized["entry"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["resource"]["name"][0]["family"], "A");
        assert_eq!(entries[1]["resource"]["name"][0]["family"], "B");
    }

    #[test]
    fn never_panics_on_odd_input() {
        let normalizer = BundleNormalizer::new();
        for input in [
            json!(null),
            json!("bundle"),
            json!([1, 2, 3]),
            json!({"entry": 42}),
            json!({"entry": [1, "two", null, []]}),
            json!({"entry": [{"resource": {"resourceType": 7}}]}),
            json!({"entry": [{"resource": {"resourceType": "Composition", "section": "flat"}}]}),
        ] {
            let once = normalizer.normalize(&input);
            assert_eq!(normalizer.normalize(&once), once);
        }
    }

    #[test]
    fn null_repeatable_field_is_left_alone() {
        let bundle = json!({"entry": [{"resource": {"resourceType": "Patient", "telecom": null}}]});
        let normalized = BundleNormalizer::new().normalize(&bundle);
        assert!(normalized["entry"][0]["resource"]["telecom"].is_null());
    }
}
