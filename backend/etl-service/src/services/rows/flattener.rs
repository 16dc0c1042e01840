use serde_json::Value;

use super::FlatRecord;

/// Serialize a nested value to its compact JSON text.
///
/// Arrays and objects become a `Value::String`; scalars are returned as-is.
/// Non-ASCII characters stay unescaped.
pub fn flatten_value(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar.clone(),
    }
}

/// Return a copy of `record` where no value is a container.
pub fn flatten_record(record: &FlatRecord) -> FlatRecord {
    record
        .iter()
        .map(|(name, value)| (name.clone(), flatten_value(value)))
        .collect()
}

pub fn flatten_records(records: &[FlatRecord]) -> Vec<FlatRecord> {
    records.iter().map(flatten_record).collect()
}
