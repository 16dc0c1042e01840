pub mod cdc;
pub mod rows;

pub use cdc::{BatchPipeline, BatchResult};
pub use rows::{FlatRecord, RowExporter};
