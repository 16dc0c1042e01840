//! Mock MessageTransport
//!
//! Serves one pre-loaded batch per session and counts opened, committed and
//! released sessions.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use etl_service::config::FetchOptions;
use etl_service::kafka::{FetchSession, MessageTransport, RawMessage};
use etl_service::{EtlError, Result};

#[derive(Debug, Default)]
pub struct TransportState {
    pub opened: usize,
    pub committed: usize,
    pub released: usize,
    /// `max_messages` seen by the last fetch
    pub last_max_messages: Option<usize>,
}

#[derive(Clone)]
pub struct MockTransport {
    messages: Vec<RawMessage>,
    fail_fetch: bool,
    fail_commit: bool,
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            fail_fetch: false,
            fail_commit: false,
            state: Arc::new(Mutex::new(TransportState::default())),
        }
    }

    pub fn failing_fetch() -> Self {
        Self {
            fail_fetch: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn failing_commit(messages: Vec<RawMessage>) -> Self {
        Self {
            fail_commit: true,
            ..Self::new(messages)
        }
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn committed(&self) -> usize {
        self.state.lock().unwrap().committed
    }

    pub fn released(&self) -> usize {
        self.state.lock().unwrap().released
    }

    pub fn last_max_messages(&self) -> Option<usize> {
        self.state.lock().unwrap().last_max_messages
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    type Session = MockSession;

    async fn open_session(&self, _options: &FetchOptions) -> Result<MockSession> {
        self.state.lock().unwrap().opened += 1;
        Ok(MockSession {
            messages: self.messages.clone(),
            fail_fetch: self.fail_fetch,
            fail_commit: self.fail_commit,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockSession {
    messages: Vec<RawMessage>,
    fail_fetch: bool,
    fail_commit: bool,
    state: Arc<Mutex<TransportState>>,
}

#[async_trait]
impl FetchSession for MockSession {
    async fn fetch_batch(
        &mut self,
        max_messages: usize,
        _poll_timeout: Duration,
    ) -> Result<Vec<RawMessage>> {
        self.state.lock().unwrap().last_max_messages = Some(max_messages);
        if self.fail_fetch {
            return Err(EtlError::Transport("broker unavailable".to_string()));
        }
        Ok(self.messages.iter().take(max_messages).cloned().collect())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.fail_commit {
            return Err(EtlError::Transport("commit rejected".to_string()));
        }
        self.state.lock().unwrap().committed += 1;
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.state.lock().unwrap().released += 1;
    }
}
