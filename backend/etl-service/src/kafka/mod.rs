//! Kafka transport
//!
//! The pipelines only see the traits defined here. `consumer` and
//! `producer` hold the `rdkafka` implementations.

pub mod consumer;
pub mod producer;

pub use consumer::{KafkaFetchSession, KafkaTransport};
pub use producer::KafkaBatchProducer;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use std::time::Duration;

use crate::config::{FetchOptions, KafkaConfig, MessageHeader};
use crate::error::Result;
use crate::services::rows::FlatRecord;

/// A message as returned by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub key: Option<Vec<u8>>,
    /// `None` for tombstones
    pub value: Option<Vec<u8>>,
    /// Broker timestamp in milliseconds
    pub timestamp_ms: Option<i64>,
    pub partition: i32,
    pub offset: i64,
}

/// A consumer scoped to one fetch cycle.
///
/// Implementations release their connection on `Drop`.
#[async_trait]
pub trait FetchSession: Send {
    /// Return up to `max_messages`, waiting at most `poll_timeout`.
    async fn fetch_batch(
        &mut self,
        max_messages: usize,
        poll_timeout: Duration,
    ) -> Result<Vec<RawMessage>>;

    /// Commit the position reached by the fetched messages.
    async fn commit(&mut self) -> Result<()>;
}

/// Source of fetch sessions
#[async_trait]
pub trait MessageTransport: Send + Sync {
    type Session: FetchSession;

    async fn open_session(&self, options: &FetchOptions) -> Result<Self::Session>;
}

/// Destination for prepared rows
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Publish every row as a UTF-8 JSON message.
    ///
    /// Returns once all rows are acknowledged. Nothing is sent if any row
    /// fails to serialize.
    async fn send_batch(
        &self,
        topic: &str,
        rows: &[FlatRecord],
        headers: &[MessageHeader],
        key: Option<&str>,
    ) -> Result<()>;
}

/// Connection and security settings common to consumers and producers
pub(crate) fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("client.id", &config.client_id);

    match &config.sasl {
        Some(sasl) => {
            client
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanism", "SCRAM-SHA-512")
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password)
                .set("enable.ssl.certificate.verification", "true");
            if let Some(pem) = &sasl.ca_pem {
                client.set("ssl.ca.pem", pem);
            } else if let Some(path) = &sasl.ca_path {
                client.set("ssl.ca.location", path);
            }
        }
        None => {
            client.set("security.protocol", "PLAINTEXT");
        }
    }

    client
}
