use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use etl_service::config::MessageHeader;
use etl_service::kafka::RecordSink;
use etl_service::services::FlatRecord;
use etl_service::{EtlError, Result};

/// One recorded `send_batch` call
#[derive(Debug, Clone)]
pub struct SentBatch {
    pub topic: String,
    pub rows: Vec<FlatRecord>,
    pub headers: Vec<MessageHeader>,
    pub key: Option<String>,
}

#[derive(Clone, Default)]
pub struct MockSink {
    sent: Arc<Mutex<Vec<SentBatch>>>,
    fail: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentBatch> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MockSink {
    async fn send_batch(
        &self,
        topic: &str,
        rows: &[FlatRecord],
        headers: &[MessageHeader],
        key: Option<&str>,
    ) -> Result<()> {
        if self.fail {
            return Err(EtlError::Transport("delivery timed out".to_string()));
        }
        self.sent.lock().unwrap().push(SentBatch {
            topic: topic.to_string(),
            rows: rows.to_vec(),
            headers: headers.to_vec(),
            key: key.map(str::to_string),
        });
        Ok(())
    }
}
