use prometheus::{Encoder, IntCounter, TextEncoder};
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

use crate::error::Result;
use crate::services::cdc::BatchResult;

static SHARED: OnceLock<PipelineMetrics> = OnceLock::new();

/// Counters for the consume and export flows
///
/// Every instance is a handle on the same process-wide counters, which are
/// registered once on the default registry.
#[derive(Clone)]
pub struct PipelineMetrics {
    /// Messages returned by the transport
    pub messages_fetched_total: IntCounter,
    /// Messages skipped because they had no value
    pub tombstones_skipped_total: IntCounter,
    /// Records handed back to the caller
    pub records_emitted_total: IntCounter,
    /// CDC envelopes with neither before nor after image
    pub envelopes_skipped_total: IntCounter,
    /// Batches aborted by a decode or normalization failure
    pub batches_failed_total: IntCounter,
    /// Rows published by the exporter
    pub rows_exported_total: IntCounter,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        SHARED.get_or_init(Self::register).clone()
    }

    fn register() -> Self {
        let registry = prometheus::default_registry();

        let messages_fetched_total = IntCounter::new(
            "etl_messages_fetched_total",
            "Total number of messages fetched from Kafka",
        )
        .expect("valid metric for etl_messages_fetched_total");

        let tombstones_skipped_total = IntCounter::new(
            "etl_tombstones_skipped_total",
            "Total number of messages without a value that were skipped",
        )
        .expect("valid metric for etl_tombstones_skipped_total");

        let records_emitted_total = IntCounter::new(
            "etl_records_emitted_total",
            "Total number of flat records produced from fetched messages",
        )
        .expect("valid metric for etl_records_emitted_total");

        let envelopes_skipped_total = IntCounter::new(
            "etl_envelopes_skipped_total",
            "Total number of CDC envelopes without before or after image",
        )
        .expect("valid metric for etl_envelopes_skipped_total");

        let batches_failed_total = IntCounter::new(
            "etl_batches_failed_total",
            "Total number of batches aborted by a fatal error",
        )
        .expect("valid metric for etl_batches_failed_total");

        let rows_exported_total = IntCounter::new(
            "etl_rows_exported_total",
            "Total number of source rows published to Kafka",
        )
        .expect("valid metric for etl_rows_exported_total");

        for metric in [
            Box::new(messages_fetched_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(tombstones_skipped_total.clone()),
            Box::new(records_emitted_total.clone()),
            Box::new(envelopes_skipped_total.clone()),
            Box::new(batches_failed_total.clone()),
            Box::new(rows_exported_total.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register pipeline metric: {}", e);
            }
        }

        Self {
            messages_fetched_total,
            tombstones_skipped_total,
            records_emitted_total,
            envelopes_skipped_total,
            batches_failed_total,
            rows_exported_total,
        }
    }

    pub fn record_batch(&self, result: &BatchResult) {
        self.tombstones_skipped_total
            .inc_by(result.stats.tombstones as u64);
        self.envelopes_skipped_total
            .inc_by(result.stats.skipped_envelopes as u64);
        self.records_emitted_total
            .inc_by(result.records.len() as u64);
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Dump the default registry in the Prometheus text format, for the
/// node_exporter textfile collector.
pub fn write_textfile(path: &Path) -> Result<()> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(path, buffer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gathered(name: &str) -> Option<f64> {
        prometheus::gather()
            .iter()
            .find(|family| family.get_name() == name)
            .map(|family| family.get_metric()[0].get_counter().get_value())
    }

    #[test]
    fn test_instances_share_registered_counters() {
        let exporter_side = PipelineMetrics::new();
        let pipeline_side = PipelineMetrics::new();
        let before = exporter_side.batches_failed_total.get();

        pipeline_side.batches_failed_total.inc();

        assert_eq!(exporter_side.batches_failed_total.get(), before + 1);
        assert!(gathered("etl_batches_failed_total").unwrap() >= (before + 1) as f64);
    }

    #[test]
    fn test_write_textfile() {
        let metrics = PipelineMetrics::new();
        metrics.rows_exported_total.inc();
        let path = std::env::temp_dir().join(format!("etl-metrics-{}.prom", uuid::Uuid::new_v4()));

        write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("etl_rows_exported_total"));
        std::fs::remove_file(&path).unwrap();
    }
}
