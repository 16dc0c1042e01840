//! Row preparation for the producer side
//!
//! Rows coming out of the relational source get a fingerprint
//! (`hasher`), have nested values serialized to text (`flattener`) and are
//! shipped to a topic by the `export` flow.

pub mod export;
pub mod flattener;
pub mod hasher;

pub use export::{ExportReport, RowExporter};
pub use flattener::{flatten_record, flatten_records, flatten_value};
pub use hasher::{append_row_hashes, row_hash, with_row_hash};

/// Column name -> value, in the record's natural field order.
pub type FlatRecord = serde_json::Map<String, serde_json::Value>;
