//! Field names the pipeline adds to records.
//!
//! All of them carry a double-underscore prefix. When a source column has
//! the same name, the reserved field overwrites it.

/// SHA-512 fingerprint of the row values
pub const ROW_HASH: &str = "__row_hash";

/// Identifier shared by every row of one export run
pub const BATCH_ID: &str = "__batch_id";

/// Broker timestamp of the message (raw consume mode)
pub const TIMESTAMP: &str = "__timestamp";

/// Operation timestamp of a CDC event (`payload.ts_ms`)
pub const OP_TS: &str = "__op_ts";

/// Set to `true` when the record is the before-image of a delete
pub const RECORD_REMOVED: &str = "__record_removed";
