use async_trait::async_trait;
use futures::future::try_join_all;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{client_config, RecordSink};
use crate::config::{KafkaConfig, MessageHeader};
use crate::error::{EtlError, Result};
use crate::services::rows::FlatRecord;

/// Kafka implementation of [`RecordSink`]
///
/// Configured with `acks = all`; a send returns only after every row has
/// been acknowledged by all in-sync replicas.
pub struct KafkaBatchProducer {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaBatchProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = client_config(config)
            .set("acks", "all")
            .set("message.send.max.retries", config.send_retries.to_string())
            .set("request.timeout.ms", config.request_timeout_ms.to_string())
            .create()
            .map_err(|e| {
                error!("Failed to create Kafka producer: {}", e);
                EtlError::Kafka(e)
            })?;

        Ok(Self {
            producer,
            delivery_timeout: Duration::from_millis(u64::from(config.request_timeout_ms)),
        })
    }
}

fn owned_headers(headers: &[MessageHeader]) -> OwnedHeaders {
    headers
        .iter()
        .fold(OwnedHeaders::new_with_capacity(headers.len()), |acc, h| {
            acc.insert(Header {
                key: h.key.as_str(),
                value: Some(h.value.as_slice()),
            })
        })
}

/// Serialize every row up front so a bad row fails the send before
/// anything is published.
fn serialize_rows(rows: &[FlatRecord]) -> Result<Vec<String>> {
    rows.iter()
        .map(|row| serde_json::to_string(row).map_err(EtlError::from))
        .collect()
}

#[async_trait]
impl RecordSink for KafkaBatchProducer {
    async fn send_batch(
        &self,
        topic: &str,
        rows: &[FlatRecord],
        headers: &[MessageHeader],
        key: Option<&str>,
    ) -> Result<()> {
        let payloads = serialize_rows(rows)?;

        let deliveries = payloads.iter().map(|payload| {
            let mut record: FutureRecord<'_, str, str> = FutureRecord::to(topic)
                .payload(payload.as_str())
                .headers(owned_headers(headers));
            if let Some(key) = key {
                record = record.key(key);
            }
            self.producer.send(record, self.delivery_timeout)
        });

        try_join_all(deliveries).await.map_err(|(e, _)| {
            error!(topic = %topic, "Kafka publish failed: {}", e);
            EtlError::Kafka(e)
        })?;

        self.producer.flush(self.delivery_timeout)?;

        debug!(topic = %topic, "Producer flushed");
        info!(topic = %topic, rows = rows.len(), "Rows published to Kafka");
        Ok(())
    }
}
