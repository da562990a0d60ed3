//! Response normalizer: maps resource-specific CRM payloads onto one stable record shape.
//!
//! The CRM nests records under a resource-specific key (`contacts`, `lists`, ...) and, depending
//! on the endpoint and version, as either a JSON array or an object keyed by record id. Each raw
//! record is projected through the descriptor's [`FieldSpec`]s:
//! - fields that are missing, `null` or of the wrong JSON type are omitted (never defaulted),
//! - records without a usable integer id are dropped,
//! - exactly one response key is ever populated.

use crate::catalog::{FieldKind, FieldSpec, ResourceDescriptor};
use crate::error::{BridgeError, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One normalized record: `id` plus the descriptor's display fields.
pub type Record = Map<String, Value>;

/// Result envelope for one resolved resource.
///
/// Serializes as `{ "<responseKey>": [records...] }`. Other resource keys are absent rather than
/// empty, so callers can tell "no matches" from "different resource".
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    key: String,
    records: Vec<Record>,
}

impl NormalizedResult {
    #[must_use]
    pub fn empty(descriptor: &ResourceDescriptor) -> Self {
        Self {
            key: descriptor.response_key().to_string(),
            records: Vec::new(),
        }
    }

    /// The populated response key (e.g. `lists` for segments).
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records under `key`, or `None` when `key` is not the populated one.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[Record]> {
        (self.key == key).then_some(self.records.as_slice())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert(
            self.key,
            Value::Array(self.records.into_iter().map(Value::Object).collect()),
        );
        Value::Object(map)
    }
}

impl Serialize for NormalizedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.records)?;
        map.end()
    }
}

/// Normalize a raw CRM payload for `descriptor`.
///
/// # Errors
///
/// Returns [`BridgeError::Upstream`] if the payload is not a JSON object, or if the collection
/// under the response key is neither an array nor an object.
pub fn normalize(descriptor: &ResourceDescriptor, payload: &Value) -> Result<NormalizedResult> {
    let Value::Object(body) = payload else {
        return Err(BridgeError::malformed(format!(
            "expected a JSON object, got {}",
            json_type_name(payload)
        )));
    };

    let raw_records: Vec<&Value> = match body.get(descriptor.response_key()) {
        None | Some(Value::Null) => {
            debug!(
                resource = %descriptor.key(),
                response_key = %descriptor.response_key(),
                "response key absent; returning empty result"
            );
            Vec::new()
        }
        Some(Value::Array(items)) => items.iter().collect(),
        // Keyed by record id; document order is preserved.
        Some(Value::Object(items)) => items.values().collect(),
        Some(other) => {
            return Err(BridgeError::malformed(format!(
                "'{}' must be an array or object, got {}",
                descriptor.response_key(),
                json_type_name(other)
            )));
        }
    };

    let mut records = Vec::with_capacity(raw_records.len());
    let mut dropped = 0usize;
    for raw in raw_records {
        match project_record(descriptor.fields(), raw) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(
            resource = %descriptor.key(),
            dropped,
            "dropped CRM records without a usable id"
        );
    }

    Ok(NormalizedResult {
        key: descriptor.response_key().to_string(),
        records,
    })
}

fn project_record(fields: &[FieldSpec], raw: &Value) -> Option<Record> {
    if !raw.is_object() {
        return None;
    }

    let mut out = Record::new();
    for field in fields {
        let pointer = field.pointer();
        let value = raw.pointer(&pointer).and_then(|v| coerce(field.kind(), v));
        match value {
            Some(v) => {
                out.insert(field.name().to_string(), v);
            }
            None if field.is_id() => return None,
            None => {
                if raw.pointer(&pointer).is_some_and(|v| !v.is_null()) {
                    debug!(field = %field.name(), "omitting field with unexpected JSON type");
                }
            }
        }
    }
    Some(out)
}

fn coerce(kind: FieldKind, v: &Value) -> Option<Value> {
    match (kind, v) {
        (_, Value::Null) => None,
        (FieldKind::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Some(v.clone())
            } else {
                None
            }
        }
        // Some CRM endpoints quote numeric ids.
        (FieldKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (FieldKind::Number, Value::Number(_))
        | (FieldKind::String, Value::String(_))
        | (FieldKind::Boolean, Value::Bool(_))
        | (FieldKind::Object, Value::Object(_) | Value::Array(_)) => Some(v.clone()),
        _ => None,
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
