use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::path::collapse_separators;
use crate::rotate::OperationMode;
use crate::store::{SecretPayload, SecretStore};

const DATA_KEY: &str = "data";

/// One matched field at one concrete store address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationResult {
    pub path: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RotationResult {
    pub fn new(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            error: None,
        }
    }

    /// Deduplication key shared by every record for the same field.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.path, self.key)
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Layout of a payload as read from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Fields nested under a `data` object next to store-managed metadata.
    Versioned,
    /// Fields stored directly at the top level.
    Flat,
}

impl PayloadShape {
    /// Separate the field set from its wrapper.
    pub fn detect(mut payload: SecretPayload) -> (Self, SecretPayload) {
        if matches!(payload.get(DATA_KEY), Some(Value::Object(_))) {
            if let Some(Value::Object(fields)) = payload.remove(DATA_KEY) {
                return (PayloadShape::Versioned, fields);
            }
        }
        (PayloadShape::Flat, payload)
    }

    /// Rebuild a writable payload from a field set.
    pub fn wrap(self, fields: SecretPayload) -> SecretPayload {
        match self {
            PayloadShape::Versioned => {
                let mut wrapped = SecretPayload::new();
                wrapped.insert(DATA_KEY.to_string(), Value::Object(fields));
                wrapped
            }
            PayloadShape::Flat => fields,
        }
    }
}

/// Which records of a secret carry the error of a failed batched write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteErrorAttribution {
    /// Every field covered by the failed write is reported as failed.
    #[default]
    AllFields,
    /// Only the last matched field carries the error.
    LastField,
}

impl WriteErrorAttribution {
    fn apply(self, results: &mut [RotationResult], message: &str) {
        match self {
            WriteErrorAttribution::AllFields => {
                for result in results.iter_mut() {
                    result.error = Some(message.to_string());
                }
            }
            WriteErrorAttribution::LastField => {
                if let Some(last) = results.last_mut() {
                    last.error = Some(message.to_string());
                }
            }
        }
    }
}

impl fmt::Display for WriteErrorAttribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteErrorAttribution::AllFields => f.write_str("all_fields"),
            WriteErrorAttribution::LastField => f.write_str("last_field"),
        }
    }
}

impl FromStr for WriteErrorAttribution {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all_fields" | "all" => Ok(WriteErrorAttribution::AllFields),
            "last_field" | "last" => Ok(WriteErrorAttribution::LastField),
            other => Err(format!("unknown write error attribution `{other}`")),
        }
    }
}

/// The value being searched for and what to replace it with.
#[derive(Debug, Clone, Copy)]
pub struct Substitution<'a> {
    pub old_value: &'a str,
    pub new_value: &'a str,
    pub mode: OperationMode,
}

/// Inspect (and in edit mode rewrite) the secret stored at `path`.
///
/// A missing secret or a failed read yields no records. Write failures never
/// abort; they are attached to the emitted records.
pub fn process_secret<S>(
    store: &S,
    path: &str,
    substitution: &Substitution<'_>,
    attribution: WriteErrorAttribution,
) -> Vec<RotationResult>
where
    S: SecretStore + ?Sized,
{
    let path = collapse_separators(path);
    let payload = match store.read(&path) {
        Ok(Some(payload)) if !payload.is_empty() => payload,
        Ok(_) => return Vec::new(),
        Err(err) => {
            debug!(path = %path, error = %err, "secret read failed; skipping");
            return Vec::new();
        }
    };

    let (shape, mut fields) = PayloadShape::detect(payload);
    let mut results = Vec::new();
    let mut staged = false;

    for (key, value) in fields.iter_mut() {
        if value.as_str() != Some(substitution.old_value) {
            continue;
        }
        info!(
            target = "audit",
            action = "rotation.match",
            path = %path,
            key = %key,
            mode = %substitution.mode,
            "credential match"
        );
        if substitution.mode == OperationMode::Edit {
            *value = Value::String(substitution.new_value.to_string());
            staged = true;
        }
        results.push(RotationResult::new(path.clone(), key.clone()));
    }

    if !staged {
        return results;
    }

    match store.write(&path, shape.wrap(fields)) {
        Ok(()) => debug!(path = %path, fields = results.len(), "secret rewritten"),
        Err(err) => {
            warn!(
                target = "audit",
                action = "rotation.write_failed",
                path = %path,
                fields = results.len(),
                error = %err,
                "failed to store rotated secret"
            );
            attribution.apply(&mut results, &err.to_string());
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn payload(value: Value) -> SecretPayload {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn edit<'a>(old: &'a str, new: &'a str) -> Substitution<'a> {
        Substitution {
            old_value: old,
            new_value: new,
            mode: OperationMode::Edit,
        }
    }

    #[test]
    fn detects_versioned_shape() {
        let (shape, fields) =
            PayloadShape::detect(payload(json!({"data": {"A": "1"}, "metadata": {}})));
        assert_eq!(shape, PayloadShape::Versioned);
        assert_eq!(fields.get("A"), Some(&json!("1")));
    }

    #[test]
    fn data_string_field_is_flat() {
        let (shape, fields) = PayloadShape::detect(payload(json!({"data": "x", "B": "2"})));
        assert_eq!(shape, PayloadShape::Flat);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn list_mode_reports_without_writing() {
        let store = MemoryStore::new();
        store.seed("kv/app", payload(json!({"PASSWORD": "old", "USER": "svc"})));
        let substitution = Substitution {
            old_value: "old",
            new_value: "",
            mode: OperationMode::List,
        };
        let results =
            process_secret(&store, "kv/app", &substitution, WriteErrorAttribution::AllFields);
        assert_eq!(results, vec![RotationResult::new("kv/app", "PASSWORD")]);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn non_string_values_are_ignored() {
        let store = MemoryStore::new();
        store.seed("kv/app", payload(json!({"PORT": 5432, "NESTED": {"x": "old"}})));
        let results =
            process_secret(&store, "kv/app", &edit("5432", "1"), WriteErrorAttribution::AllFields);
        assert!(results.is_empty());
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn missing_secret_yields_nothing() {
        let store = MemoryStore::new();
        let results =
            process_secret(&store, "kv/none", &edit("a", "b"), WriteErrorAttribution::AllFields);
        assert!(results.is_empty());
    }

    #[test]
    fn failed_write_marks_every_field_by_default() {
        let store = MemoryStore::new();
        store.seed("kv/app", payload(json!({"A": "old", "B": "old"})));
        store.fail_writes_to("kv/app");
        let results =
            process_secret(&store, "kv/app", &edit("old", "new"), WriteErrorAttribution::AllFields);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(RotationResult::is_failed));
    }

    #[test]
    fn failed_write_marks_last_field_when_configured() {
        let store = MemoryStore::new();
        store.seed("kv/app", payload(json!({"A": "old", "B": "old"})));
        store.fail_writes_to("kv/app");
        let results =
            process_secret(&store, "kv/app", &edit("old", "new"), WriteErrorAttribution::LastField);
        assert_eq!(results[0].error, None);
        assert!(results[1].error.is_some());
    }

    #[test]
    fn attribution_parses_from_config_strings() {
        assert_eq!(
            "last-field".parse::<WriteErrorAttribution>().unwrap(),
            WriteErrorAttribution::LastField
        );
        assert_eq!(
            "ALL_FIELDS".parse::<WriteErrorAttribution>().unwrap(),
            WriteErrorAttribution::AllFields
        );
        assert!("some".parse::<WriteErrorAttribution>().is_err());
    }
}
