use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to decode message (partition={partition}, offset={offset}): {reason}")]
    Decode {
        partition: i32,
        offset: i64,
        reason: String,
    },

    #[error(transparent)]
    Normalization(#[from] NormalizationFailure),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A CDC message that could not be turned into a flat record.
///
/// Fatal for the whole batch. Carries the raw record so the offending
/// message can be found in the topic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Error on processing message: {cause}\n{record}")]
pub struct NormalizationFailure {
    /// Raw decoded record, as compact JSON text
    pub record: String,
    /// Stringified cause
    pub cause: String,
}

impl NormalizationFailure {
    pub fn new(record: &serde_json::Value, cause: impl ToString) -> Self {
        Self {
            record: record.to_string(),
            cause: cause.to_string(),
        }
    }
}
