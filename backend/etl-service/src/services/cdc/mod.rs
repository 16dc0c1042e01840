/// Debezium CDC extraction
///
/// # Architecture
/// - **Models**: envelope structures (Debezium format, schema wrapper enabled)
/// - **Classifier**: picks the columns that need a value correction
/// - **Normalizer**: envelope -> flat record with operation metadata
/// - **Pipeline**: fetch, decode, classify once, normalize every message
pub mod classifier;
pub mod models;
pub mod normalizer;
pub mod pipeline;

pub use classifier::{
    classify, classify_envelope, Corrections, FieldCorrection, LogicalType, SchemaError,
};
pub use models::{CdcEnvelope, CdcPayload, EnvelopeSchema, SchemaField};
pub use normalizer::{
    format_micro_timestamp, normalize, normalize_value, NormalizeOutcome, SkipReason,
};
pub use pipeline::{process_messages, BatchPipeline, BatchResult, BatchStats};
