use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use etl_service::db::RelationalSource;
use etl_service::services::FlatRecord;
use etl_service::{EtlError, Result};

/// Returns fixed rows for any query and remembers the queries it saw
#[derive(Clone, Default)]
pub struct MockSource {
    rows: Vec<FlatRecord>,
    fail: bool,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockSource {
    pub fn new(rows: Vec<FlatRecord>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelationalSource for MockSource {
    async fn run_query(&self, sql: &str) -> Result<Vec<FlatRecord>> {
        self.queries.lock().unwrap().push(sql.to_string());
        if self.fail {
            return Err(EtlError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.rows.clone())
    }
}
