//! Schema field classifier
//!
//! Reads the Kafka Connect schema embedded in a Debezium envelope and picks
//! the columns of the `after` image whose logical type needs a value
//! correction before the record leaves the pipeline.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::models::EnvelopeSchema;

/// Role marker of the after-image entry in the schema field list
const AFTER_ROLE: &str = "after";

/// Logical types that get a value correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    /// Microseconds since the Unix epoch (`io.debezium.time.MicroTimestamp`)
    MicroTimestamp,
}

impl LogicalType {
    /// Type name suffixes that select a column for correction
    const SELECTED_SUFFIXES: [&'static str; 1] = ["MicroTimestamp"];

    /// Whether the last segment of a logical type name selects the column.
    pub fn is_selected(segment: &str) -> bool {
        Self::SELECTED_SUFFIXES
            .iter()
            .any(|suffix| segment.ends_with(suffix))
    }

    /// Exact match on the last segment of a logical type name.
    pub fn from_type_name(segment: &str) -> Option<Self> {
        match segment {
            "MicroTimestamp" => Some(LogicalType::MicroTimestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCorrection {
    /// Column name in the after/before image
    pub name: String,
    /// `None` when the type name only shares the suffix; the value is left
    /// as is
    pub logical_type: Option<LogicalType>,
    /// Last segment of the logical type name, e.g. `MicroTimestamp`
    pub type_name: String,
}

/// Ordered, read-only set of corrections for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corrections {
    fields: Vec<FieldCorrection>,
}

impl Corrections {
    pub fn new(fields: Vec<FieldCorrection>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldCorrection> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The envelope schema cannot be used for classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("envelope has no schema")]
    MissingSchema,

    #[error("envelope schema is invalid: {0}")]
    Invalid(String),

    #[error("schema has no 'after' field entry")]
    MissingAfterField,
}

pub fn classify(schema: &EnvelopeSchema) -> Result<Corrections, SchemaError> {
    let after = schema
        .fields
        .iter()
        .find(|entry| entry.field.as_deref() == Some(AFTER_ROLE))
        .ok_or(SchemaError::MissingAfterField)?;

    let fields = after
        .fields
        .iter()
        .filter_map(|column| {
            let type_name = column.name.as_deref()?.rsplit('.').next()?;
            if !LogicalType::is_selected(type_name) {
                return None;
            }
            Some(FieldCorrection {
                name: column.field.clone()?,
                logical_type: LogicalType::from_type_name(type_name),
                type_name: type_name.to_string(),
            })
        })
        .collect();

    Ok(Corrections::new(fields))
}

/// Classify straight from a decoded message.
pub fn classify_envelope(message: &Value) -> Result<Corrections, SchemaError> {
    let schema = message
        .get("schema")
        .filter(|schema| !schema.is_null())
        .ok_or(SchemaError::MissingSchema)?;

    let schema =
        EnvelopeSchema::deserialize(schema).map_err(|e| SchemaError::Invalid(e.to_string()))?;

    classify(&schema)
}
