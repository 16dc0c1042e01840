//! Batch pipeline: fetch -> decode -> classify -> normalize -> collect.
//!
//! One call handles one batch. The correction set is derived from the first
//! decoded envelope and shared read-only by every normalize call of that
//! batch. A batch either completes (`Ok`, possibly empty) or fails as a
//! whole; a failed batch returns no records and commits nothing.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::classifier::{classify_envelope, Corrections};
use super::normalizer::{normalize_value, NormalizeOutcome};
use crate::config::FetchOptions;
use crate::error::{EtlError, Result};
use crate::kafka::{FetchSession, MessageTransport, RawMessage};
use crate::metrics::PipelineMetrics;
use crate::reserved;
use crate::services::rows::FlatRecord;

/// Counters of one processed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Messages returned by the transport
    pub fetched: usize,
    /// Messages without a value
    pub tombstones: usize,
    /// Envelopes with neither image
    pub skipped_envelopes: usize,
    /// Times the classifier ran
    pub classifications: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    /// Output records in arrival order
    pub records: Vec<FlatRecord>,
    /// Highest offset seen in the batch, `None` for an empty batch
    pub offset: Option<i64>,
    pub stats: BatchStats,
}

struct DecodedMessage {
    value: Value,
    timestamp_ms: Option<i64>,
    partition: i32,
    offset: i64,
}

fn decode(message: &RawMessage, body: &[u8]) -> Result<DecodedMessage> {
    let value = serde_json::from_slice(body).map_err(|e| EtlError::Decode {
        partition: message.partition,
        offset: message.offset,
        reason: e.to_string(),
    })?;

    Ok(DecodedMessage {
        value,
        timestamp_ms: message.timestamp_ms,
        partition: message.partition,
        offset: message.offset,
    })
}

fn classify_or_empty(message: &Value) -> Corrections {
    match classify_envelope(message) {
        Ok(corrections) => {
            debug!(fields = corrections.len(), "Classified envelope schema");
            corrections
        }
        Err(e) => {
            warn!("Envelope schema not usable, no field corrections apply: {}", e);
            Corrections::empty()
        }
    }
}

fn schema_of(message: &Value) -> Option<&Value> {
    message.get("schema").filter(|schema| !schema.is_null())
}

fn raw_records(decoded: Vec<DecodedMessage>) -> Result<Vec<FlatRecord>> {
    decoded
        .into_iter()
        .map(|message| match message.value {
            Value::Object(mut record) => {
                record.insert(
                    reserved::TIMESTAMP.to_string(),
                    message.timestamp_ms.map(Value::from).unwrap_or(Value::Null),
                );
                Ok(record)
            }
            other => Err(EtlError::Decode {
                partition: message.partition,
                offset: message.offset,
                reason: format!("expected a JSON object, got {}", other),
            }),
        })
        .collect()
}

fn cdc_records(decoded: &[DecodedMessage], stats: &mut BatchStats) -> Result<Vec<FlatRecord>> {
    let Some(first) = decoded.first() else {
        return Ok(Vec::new());
    };

    let mut corrections = classify_or_empty(&first.value);
    let mut active_schema = schema_of(&first.value);
    stats.classifications += 1;

    let mut records = Vec::with_capacity(decoded.len());
    for message in decoded {
        let schema = schema_of(&message.value);
        if schema != active_schema {
            warn!(
                partition = message.partition,
                offset = message.offset,
                "Envelope schema changed within the batch, reclassifying"
            );
            corrections = classify_or_empty(&message.value);
            active_schema = schema;
            stats.classifications += 1;
        }

        match normalize_value(&message.value, &corrections) {
            Ok(NormalizeOutcome::Emit(record)) => records.push(record),
            Ok(NormalizeOutcome::Skip(reason)) => {
                debug!(
                    partition = message.partition,
                    offset = message.offset,
                    ?reason,
                    "Skipping CDC envelope"
                );
                stats.skipped_envelopes += 1;
            }
            Err(failure) => {
                error!(
                    partition = message.partition,
                    offset = message.offset,
                    cause = %failure.cause,
                    "Failed to normalize CDC envelope, aborting batch"
                );
                return Err(failure.into());
            }
        }
    }

    Ok(records)
}

/// Decode and reshape one fetched batch.
///
/// Tombstones (messages without a value) are skipped before decoding but
/// still count towards the returned offset.
pub fn process_messages(messages: &[RawMessage], extract_cdc: bool) -> Result<BatchResult> {
    let mut stats = BatchStats {
        fetched: messages.len(),
        ..BatchStats::default()
    };
    let mut offset: Option<i64> = None;
    let mut decoded = Vec::with_capacity(messages.len());

    for message in messages {
        offset = Some(offset.map_or(message.offset, |seen| seen.max(message.offset)));

        let Some(body) = message.value.as_deref() else {
            debug!(
                partition = message.partition,
                offset = message.offset,
                "Skipping tombstone message"
            );
            stats.tombstones += 1;
            continue;
        };

        decoded.push(decode(message, body)?);
    }

    let records = if extract_cdc {
        cdc_records(&decoded, &mut stats)?
    } else {
        raw_records(decoded)?
    };

    Ok(BatchResult {
        records,
        offset,
        stats,
    })
}

/// Fetches batches through a transport and runs them through
/// [`process_messages`].
pub struct BatchPipeline<T: MessageTransport> {
    transport: T,
    metrics: PipelineMetrics,
}

impl<T: MessageTransport> BatchPipeline<T> {
    pub fn new(transport: T) -> Self {
        Self::with_metrics(transport, PipelineMetrics::new())
    }

    pub fn with_metrics(transport: T, metrics: PipelineMetrics) -> Self {
        Self { transport, metrics }
    }

    /// Fetch and process one batch.
    ///
    /// The transport session lives for the whole call and is released when
    /// it returns, on success and on every error path. The consumer
    /// position is committed only after the batch completed.
    pub async fn fetch_batch(&self, options: &FetchOptions) -> Result<BatchResult> {
        info!(
            topic = %options.topic,
            group = %options.consumer_group,
            max_messages = options.max_messages,
            extract_cdc = options.extract_cdc_payload,
            "Fetching batch"
        );

        let mut session = self.transport.open_session(options).await?;
        let messages = session
            .fetch_batch(options.max_messages, options.poll_timeout)
            .await?;
        self.metrics
            .messages_fetched_total
            .inc_by(messages.len() as u64);

        let result = match process_messages(&messages, options.extract_cdc_payload) {
            Ok(result) => result,
            Err(e) => {
                self.metrics.batches_failed_total.inc();
                error!(topic = %options.topic, "Batch failed: {}", e);
                return Err(e);
            }
        };

        if options.commit_offset && !messages.is_empty() {
            session.commit().await?;
            debug!(topic = %options.topic, offset = ?result.offset, "Committed consumer position");
        }

        self.metrics.record_batch(&result);

        info!(
            topic = %options.topic,
            fetched = result.stats.fetched,
            records = result.records.len(),
            offset = ?result.offset,
            "Batch complete"
        );

        Ok(result)
    }
}
