use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{append_row_hashes, flatten_records};
use crate::config::ExportOptions;
use crate::db::RelationalSource;
use crate::error::Result;
use crate::kafka::RecordSink;
use crate::metrics::PipelineMetrics;
use crate::reserved;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub rows_sent: usize,
    /// Set when the rows were stamped with `__batch_id`
    pub batch_id: Option<Uuid>,
}

/// Query -> fingerprint -> flatten -> publish
pub struct RowExporter<S: RelationalSource, K: RecordSink> {
    source: S,
    sink: K,
    metrics: PipelineMetrics,
}

impl<S: RelationalSource, K: RecordSink> RowExporter<S, K> {
    pub fn new(source: S, sink: K) -> Self {
        Self::with_metrics(source, sink, PipelineMetrics::new())
    }

    pub fn with_metrics(source: S, sink: K, metrics: PipelineMetrics) -> Self {
        Self {
            source,
            sink,
            metrics,
        }
    }

    pub async fn export(&self, sql: &str, options: &ExportOptions) -> Result<ExportReport> {
        let rows = self.source.run_query(sql).await?;
        if rows.is_empty() {
            info!(topic = %options.topic, "Query returned no rows, nothing to export");
            return Ok(ExportReport {
                rows_sent: 0,
                batch_id: None,
            });
        }

        let mut prepared = flatten_records(&append_row_hashes(&rows));

        // Stamped after hashing so the fingerprint does not change per run.
        let batch_id = options.stamp_batch_id.then(Uuid::new_v4);
        if let Some(id) = batch_id {
            let id = Value::String(id.to_string());
            for row in &mut prepared {
                row.insert(reserved::BATCH_ID.to_string(), id.clone());
            }
        }

        self.sink
            .send_batch(
                &options.topic,
                &prepared,
                &options.headers,
                options.key.as_deref(),
            )
            .await?;

        self.metrics
            .rows_exported_total
            .inc_by(prepared.len() as u64);
        info!(
            topic = %options.topic,
            rows = prepared.len(),
            batch_id = ?batch_id,
            "Export complete"
        );

        Ok(ExportReport {
            rows_sent: prepared.len(),
            batch_id,
        })
    }
}
