use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use super::{client_config, FetchSession, MessageTransport, RawMessage};
use crate::config::{FetchOptions, KafkaConfig};
use crate::error::{EtlError, Result};

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

impl RawMessage {
    fn from_borrowed(message: &BorrowedMessage<'_>) -> Self {
        Self {
            key: message.key().map(<[u8]>::to_vec),
            value: message.payload().map(<[u8]>::to_vec),
            timestamp_ms: message.timestamp().to_millis(),
            partition: message.partition(),
            offset: message.offset(),
        }
    }
}

/// Kafka implementation of [`MessageTransport`]
///
/// Every fetch cycle gets its own consumer, assigned to all partitions of
/// the topic and resuming from the group's committed offsets.
pub struct KafkaTransport {
    config: KafkaConfig,
}

impl KafkaTransport {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }

    fn consumer_config(&self, options: &FetchOptions) -> ClientConfig {
        let mut client = client_config(&self.config);
        client
            .set("group.id", &options.consumer_group)
            .set("enable.auto.commit", "false") // committed by the pipeline after a good batch
            .set("auto.offset.reset", options.start_position.as_offset_reset())
            .set(
                "session.timeout.ms",
                self.config.session_timeout_ms.to_string(),
            )
            .set(
                "heartbeat.interval.ms",
                self.config.heartbeat_interval_ms.to_string(),
            )
            .set(
                "max.partition.fetch.bytes",
                options.max_partition_fetch_bytes.to_string(),
            )
            .set("enable.partition.eof", "false");
        client
    }

    /// Names of all topics visible to the configured client, sorted.
    pub fn list_topics(&self) -> Result<Vec<String>> {
        let consumer: BaseConsumer = client_config(&self.config).create()?;
        let metadata = consumer.fetch_metadata(None, METADATA_TIMEOUT)?;

        let mut topics: Vec<String> = metadata
            .topics()
            .iter()
            .map(|topic| topic.name().to_string())
            .collect();
        topics.sort();
        Ok(topics)
    }
}

#[async_trait]
impl MessageTransport for KafkaTransport {
    type Session = KafkaFetchSession;

    async fn open_session(&self, options: &FetchOptions) -> Result<KafkaFetchSession> {
        let consumer: StreamConsumer = self.consumer_config(options).create().map_err(|e| {
            error!("Failed to create Kafka consumer: {}", e);
            EtlError::Kafka(e)
        })?;

        let metadata = consumer.fetch_metadata(Some(&options.topic), METADATA_TIMEOUT)?;
        let topic = metadata
            .topics()
            .iter()
            .find(|topic| topic.name() == options.topic)
            .ok_or_else(|| {
                EtlError::Transport(format!("topic '{}' not found", options.topic))
            })?;
        if let Some(err) = topic.error() {
            return Err(EtlError::Transport(format!(
                "metadata error for topic '{}': {:?}",
                options.topic, err
            )));
        }

        let mut assignment = TopicPartitionList::new();
        for partition in topic.partitions() {
            assignment.add_partition_offset(&options.topic, partition.id(), Offset::Stored)?;
        }
        consumer.assign(&assignment).map_err(|e| {
            error!("Failed to assign partitions: {}", e);
            EtlError::Kafka(e)
        })?;

        info!(
            topic = %options.topic,
            group = %options.consumer_group,
            partitions = assignment.count(),
            "Kafka fetch session opened"
        );

        Ok(KafkaFetchSession {
            consumer,
            topic: options.topic.clone(),
        })
    }
}

/// Consumer assigned for a single fetch cycle; closed on drop
pub struct KafkaFetchSession {
    consumer: StreamConsumer,
    topic: String,
}

#[async_trait]
impl FetchSession for KafkaFetchSession {
    async fn fetch_batch(
        &mut self,
        max_messages: usize,
        poll_timeout: Duration,
    ) -> Result<Vec<RawMessage>> {
        let deadline = Instant::now() + poll_timeout;
        let mut messages = Vec::with_capacity(max_messages.min(1024));

        while messages.len() < max_messages {
            match timeout_at(deadline, self.consumer.recv()).await {
                Ok(Ok(message)) => messages.push(RawMessage::from_borrowed(&message)),
                Ok(Err(e)) => {
                    error!(topic = %self.topic, "Kafka consumer error: {}", e);
                    return Err(EtlError::Kafka(e));
                }
                Err(_) => break,
            }
        }

        debug!(
            topic = %self.topic,
            count = messages.len(),
            "Fetched messages"
        );
        Ok(messages)
    }

    async fn commit(&mut self) -> Result<()> {
        self.consumer
            .commit_consumer_state(CommitMode::Sync)
            .map_err(|e| {
                error!(topic = %self.topic, "Failed to commit offsets: {}", e);
                EtlError::Kafka(e)
            })
    }
}

impl Drop for KafkaFetchSession {
    fn drop(&mut self) {
        if let Err(e) = self.consumer.unassign() {
            warn!(topic = %self.topic, "Failed to unassign partitions: {}", e);
        }
        debug!(topic = %self.topic, "Kafka fetch session closed");
    }
}
