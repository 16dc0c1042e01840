use std::borrow::Cow;

use serde_json::Value;
use sha2::{Digest, Sha512};

use super::FlatRecord;
use crate::reserved;

/// Text a value contributes to the row fingerprint.
///
/// Strings contribute their raw text, everything else its compact JSON form.
fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// SHA-512 hex digest over the concatenated values, in field order.
pub fn row_hash(record: &FlatRecord) -> String {
    let mut hasher = Sha512::new();
    for value in record.values() {
        hasher.update(value_text(value).as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Copy of `record` with `__row_hash` set.
pub fn with_row_hash(record: &FlatRecord) -> FlatRecord {
    let hash = row_hash(record);
    let mut hashed = record.clone();
    hashed.insert(reserved::ROW_HASH.to_string(), Value::String(hash));
    hashed
}

pub fn append_row_hashes(records: &[FlatRecord]) -> Vec<FlatRecord> {
    records.iter().map(with_row_hash).collect()
}
