use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::services::rows::FlatRecord;

/// Debezium change event with the schema wrapper
/// (`value.converter.schemas.enable = true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdcEnvelope {
    #[serde(default)]
    pub schema: Option<EnvelopeSchema>,
    pub payload: CdcPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdcPayload {
    /// Row state before the change (null for inserts)
    #[serde(default)]
    pub before: Option<FlatRecord>,

    /// Row state after the change (null for deletes)
    #[serde(default)]
    pub after: Option<FlatRecord>,

    /// Operation timestamp. Kept as the raw number; its unit depends on the
    /// connector.
    #[serde(default)]
    pub ts_ms: Option<Number>,
}

/// Kafka Connect schema attached to the envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSchema {
    #[serde(default, rename = "type")]
    pub schema_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

/// One entry of a schema field list.
///
/// At the top level `field` is the envelope role (`before`, `after`,
/// `source`, ...). Inside a role, `field` is the column name and `name`
/// the logical type, e.g. `io.debezium.time.MicroTimestamp`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}
