//! Queue ETL
//!
//! Moves rows from PostgreSQL into Kafka and pulls Debezium change events
//! back out as flat records.
//!
//! - [`services::rows`]: row fingerprinting, flattening and the export flow
//! - [`services::cdc`]: envelope classification, normalization and the
//!   batch pipeline
//! - [`kafka`] / [`db`]: transport and source traits with their `rdkafka`
//!   and `sqlx` implementations

pub mod config;
pub mod db;
pub mod error;
pub mod kafka;
pub mod metrics;
pub mod reserved;
pub mod services;

pub use error::{EtlError, NormalizationFailure, Result};
