//! In-memory transport, sink and source for integration tests
//!
//! Each mock keeps its state behind an `Arc<Mutex<..>>` so the test can
//! inspect what the pipeline did after handing ownership over.

#![allow(dead_code)]

pub mod mock_sink;
pub mod mock_source;
pub mod mock_transport;

use etl_service::kafka::RawMessage;
use etl_service::services::FlatRecord;
use serde_json::Value;

/// Build a broker message carrying `value` as JSON.
pub fn message(offset: i64, value: Option<Value>) -> RawMessage {
    RawMessage {
        key: None,
        value: value.map(|v| v.to_string().into_bytes()),
        timestamp_ms: Some(1_700_000_000_000 + offset),
        partition: 0,
        offset,
    }
}

/// Unwrap a `json!` object literal into a record.
pub fn record(value: Value) -> FlatRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
