//! Env-driven configuration for the Kafka transport and the pipelines.
//!
//! Nothing here is process-global: every config is built once (usually via
//! `from_env`) and handed to the collaborator that needs it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use db_pool::env_utils::{parse_env_flag, parse_env_optional, parse_env_with_default};

use crate::error::EtlError;

const DEFAULT_MAX_MESSAGES: usize = 1000;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_PARTITION_FETCH_MB: usize = 200;

/// SASL_SSL credentials (SCRAM-SHA-512)
#[derive(Clone)]
pub struct SaslConfig {
    pub username: String,
    pub password: String,
    /// PEM encoded CA certificate used to verify the brokers
    pub ca_pem: Option<String>,
    /// Path to a CA certificate file, used when `ca_pem` is not set
    pub ca_path: Option<String>,
}

impl fmt::Debug for SaslConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaslConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("ca_pem", &self.ca_pem.as_ref().map(|_| "[PEM]"))
            .field("ca_path", &self.ca_path)
            .finish()
    }
}

/// Broker connection settings shared by the consumer and the producer
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Kafka brokers (comma-separated)
    pub brokers: String,
    pub client_id: String,
    pub session_timeout_ms: u32,
    pub heartbeat_interval_ms: u32,
    /// Producer request timeout
    pub request_timeout_ms: u32,
    /// Producer send retries
    pub send_retries: u32,
    /// `None` means PLAINTEXT
    pub sasl: Option<SaslConfig>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            client_id: "queue-etl".to_string(),
            session_timeout_ms: 60_000,
            heartbeat_interval_ms: 20_000,
            request_timeout_ms: 60_000,
            send_retries: 3,
            sasl: None,
        }
    }
}

impl KafkaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sasl = match (
            std::env::var("KAFKA_SASL_USERNAME"),
            std::env::var("KAFKA_SASL_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(SaslConfig {
                username,
                password,
                ca_pem: std::env::var("KAFKA_CA_PEM").ok(),
                ca_path: std::env::var("KAFKA_CA_PATH").ok(),
            }),
            _ => None,
        };

        Self {
            brokers: std::env::var("KAFKA_BROKERS").unwrap_or(defaults.brokers),
            client_id: std::env::var("KAFKA_CLIENT_ID").unwrap_or(defaults.client_id),
            session_timeout_ms: parse_env_with_default(
                "KAFKA_SESSION_TIMEOUT_MS",
                defaults.session_timeout_ms,
            ),
            heartbeat_interval_ms: parse_env_with_default(
                "KAFKA_HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval_ms,
            ),
            request_timeout_ms: parse_env_with_default(
                "KAFKA_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            ),
            send_retries: parse_env_with_default("KAFKA_SEND_RETRIES", defaults.send_retries),
            sasl,
        }
    }
}

/// Where a consumer group without a committed offset starts reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartPosition {
    #[default]
    Earliest,
    Latest,
}

impl StartPosition {
    /// Value for librdkafka's `auto.offset.reset`
    pub fn as_offset_reset(&self) -> &'static str {
        match self {
            StartPosition::Earliest => "earliest",
            StartPosition::Latest => "latest",
        }
    }
}

impl FromStr for StartPosition {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" => Ok(StartPosition::Earliest),
            "latest" => Ok(StartPosition::Latest),
            other => Err(EtlError::Config(format!(
                "unknown start position '{}', expected 'earliest' or 'latest'",
                other
            ))),
        }
    }
}

/// Parameters of one fetch cycle
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub topic: String,
    pub consumer_group: String,
    /// Upper bound on messages returned by one fetch
    pub max_messages: usize,
    /// Wall-clock bound on the fetch
    pub poll_timeout: Duration,
    pub max_partition_fetch_bytes: usize,
    pub start_position: StartPosition,
    /// Commit the consumer position after a successful batch
    pub commit_offset: bool,
    /// Reshape Debezium envelopes into flat records
    pub extract_cdc_payload: bool,
}

impl FetchOptions {
    pub fn new(topic: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            consumer_group: consumer_group.into(),
            max_messages: DEFAULT_MAX_MESSAGES,
            poll_timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            max_partition_fetch_bytes: DEFAULT_MAX_PARTITION_FETCH_MB * 1024 * 1024,
            start_position: StartPosition::default(),
            commit_offset: true,
            extract_cdc_payload: false,
        }
    }

    pub fn from_env(
        topic: impl Into<String>,
        consumer_group: impl Into<String>,
    ) -> Result<Self, EtlError> {
        let mut options = Self::new(topic, consumer_group);

        options.max_messages = parse_env_with_default("FETCH_MAX_MESSAGES", options.max_messages);
        options.poll_timeout = Duration::from_secs(parse_env_with_default(
            "FETCH_POLL_TIMEOUT_SECS",
            DEFAULT_POLL_TIMEOUT_SECS,
        ));
        options.max_partition_fetch_bytes =
            parse_env_with_default("FETCH_MAX_PARTITION_MB", DEFAULT_MAX_PARTITION_FETCH_MB)
                * 1024
                * 1024;
        if let Some(reset) = parse_env_optional::<String>("FETCH_OFFSET_RESET") {
            options.start_position = reset.parse()?;
        }
        options.commit_offset = parse_env_flag("FETCH_COMMIT_OFFSET", options.commit_offset);
        options.extract_cdc_payload =
            parse_env_flag("FETCH_EXTRACT_CDC", options.extract_cdc_payload);

        if options.max_messages == 0 {
            return Err(EtlError::Config(
                "FETCH_MAX_MESSAGES must be greater than zero".to_string(),
            ));
        }

        Ok(options)
    }

    pub fn with_cdc_extraction(mut self, enabled: bool) -> Self {
        self.extract_cdc_payload = enabled;
        self
    }

    pub fn with_commit(mut self, enabled: bool) -> Self {
        self.commit_offset = enabled;
        self
    }
}

/// Header attached to every produced message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub key: String,
    pub value: Vec<u8>,
}

impl MessageHeader {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Parameters of one export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub topic: String,
    /// Message key applied to every row
    pub key: Option<String>,
    pub headers: Vec<MessageHeader>,
    /// Stamp `__batch_id` on every row
    pub stamp_batch_id: bool,
}

impl ExportOptions {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            headers: Vec::new(),
            stamp_batch_id: false,
        }
    }

    pub fn from_env(topic: impl Into<String>) -> Self {
        let mut options = Self::new(topic);
        options.key = parse_env_optional("EXPORT_MESSAGE_KEY");
        options.stamp_batch_id = parse_env_flag("EXPORT_STAMP_BATCH_ID", false);
        options
    }
}
