//! Integration Tests: Row Exporter
//!
//! Runs `RowExporter::export` against an in-memory source and sink.

mod common;

use common::mock_sink::MockSink;
use common::mock_source::MockSource;
use common::record;
use etl_service::config::{ExportOptions, MessageHeader};
use etl_service::services::rows::{flatten_record, row_hash};
use etl_service::services::RowExporter;
use etl_service::EtlError;
use serde_json::json;

fn customer_rows() -> Vec<serde_json::Map<String, serde_json::Value>> {
    vec![
        record(json!({"id": 1, "name": "Ada", "tags": ["vip", "eu"], "address": {"city": "Zürich"}})),
        record(json!({"id": 2, "name": null, "tags": [], "address": null})),
    ]
}

#[tokio::test]
async fn test_export_hashes_then_flattens() {
    let source = MockSource::new(customer_rows());
    let sink = MockSink::new();
    let exporter = RowExporter::new(source.clone(), sink.clone());

    let report = exporter
        .export("SELECT * FROM customers", &ExportOptions::new("customers"))
        .await
        .unwrap();

    assert_eq!(report.rows_sent, 2);
    assert_eq!(report.batch_id, None);
    assert_eq!(source.queries(), vec!["SELECT * FROM customers".to_string()]);

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].topic, "customers");

    let first = &sent[0].rows[0];
    assert_eq!(first["tags"], json!(r#"["vip","eu"]"#));
    assert_eq!(first["address"], json!(r#"{"city":"Zürich"}"#));

    // Flattening leaves strings untouched, so the hash of the flattened
    // row equals the hash of the source row.
    let source_row = &customer_rows()[0];
    assert_eq!(first["__row_hash"], json!(row_hash(source_row)));
    assert_eq!(row_hash(&flatten_record(source_row)), row_hash(source_row));
}

#[tokio::test]
async fn test_export_passes_headers_and_key() {
    let sink = MockSink::new();
    let exporter = RowExporter::new(MockSource::new(customer_rows()), sink.clone());
    let options = ExportOptions {
        key: Some("customers-full".to_string()),
        headers: vec![MessageHeader::new("source", "postgres")],
        ..ExportOptions::new("customers")
    };

    exporter.export("SELECT 1", &options).await.unwrap();

    let sent = sink.sent();
    assert_eq!(sent[0].key.as_deref(), Some("customers-full"));
    assert_eq!(sent[0].headers, vec![MessageHeader::new("source", "postgres")]);
}

#[tokio::test]
async fn test_export_stamps_batch_id_after_hashing() {
    let sink = MockSink::new();
    let exporter = RowExporter::new(MockSource::new(customer_rows()), sink.clone());
    let options = ExportOptions {
        stamp_batch_id: true,
        ..ExportOptions::new("customers")
    };

    let report = exporter.export("SELECT 1", &options).await.unwrap();

    let batch_id = report.batch_id.expect("batch id should be set");
    let rows = &sink.sent()[0].rows;
    for row in rows {
        assert_eq!(row["__batch_id"], json!(batch_id.to_string()));
    }
    assert_eq!(rows[0]["__row_hash"], json!(row_hash(&customer_rows()[0])));
}

#[tokio::test]
async fn test_empty_result_sends_nothing() {
    let sink = MockSink::new();
    let exporter = RowExporter::new(MockSource::new(Vec::new()), sink.clone());

    let report = exporter
        .export("SELECT 1 WHERE false", &ExportOptions::new("customers"))
        .await
        .unwrap();

    assert_eq!(report.rows_sent, 0);
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn test_source_error_propagates() {
    let sink = MockSink::new();
    let exporter = RowExporter::new(MockSource::failing(), sink.clone());

    let err = exporter
        .export("SELECT 1", &ExportOptions::new("customers"))
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::Database(_)));
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn test_sink_error_propagates() {
    let exporter = RowExporter::new(MockSource::new(customer_rows()), MockSink::failing());

    let err = exporter
        .export("SELECT 1", &ExportOptions::new("customers"))
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::Transport(_)));
}
