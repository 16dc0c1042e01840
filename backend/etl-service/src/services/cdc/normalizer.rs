//! Payload normalizer
//!
//! Turns one Debezium envelope into at most one flat record: the after-image
//! (or the before-image of a delete) plus operation metadata, with the
//! classified columns corrected.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::classifier::{Corrections, LogicalType};
use super::models::{CdcEnvelope, CdcPayload};
use crate::error::NormalizationFailure;
use crate::reserved;
use crate::services::rows::FlatRecord;

const MICRO_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Why an envelope produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither `before` nor `after` is present
    NoImage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Emit(FlatRecord),
    Skip(SkipReason),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
enum CorrectionError {
    #[error("field '{field}' is not a numeric microsecond timestamp: {value}")]
    NotNumeric { field: String, value: String },

    #[error("field '{field}' is out of the representable time range: {value}")]
    OutOfRange { field: String, value: String },
}

/// Render microseconds since the Unix epoch as `YYYY-MM-DD HH:MM:SS.ffffff` (UTC).
pub fn format_micro_timestamp(micros: i64) -> Option<String> {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.format(MICRO_TIMESTAMP_FORMAT).to_string())
}

fn micros_from_f64(field: &str, value: &Value, f: f64) -> Result<i64, CorrectionError> {
    if !f.is_finite() {
        return Err(CorrectionError::NotNumeric {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    if f.abs() >= i64::MAX as f64 {
        return Err(CorrectionError::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(f.round() as i64)
}

fn micros_from_value(field: &str, value: &Value) -> Result<i64, CorrectionError> {
    let not_numeric = || CorrectionError::NotNumeric {
        field: field.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(micros), _) => Ok(micros),
            // u64 above i64::MAX lands here as well
            (None, Some(f)) => micros_from_f64(field, value, f),
            (None, None) => Err(not_numeric()),
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(micros) => Ok(micros),
                Err(_) => {
                    let f = s.parse::<f64>().map_err(|_| not_numeric())?;
                    micros_from_f64(field, value, f)
                }
            }
        }
        _ => Err(not_numeric()),
    }
}

fn correct_value(
    field: &str,
    logical_type: LogicalType,
    value: &Value,
) -> Result<Value, CorrectionError> {
    match logical_type {
        LogicalType::MicroTimestamp => {
            let micros = micros_from_value(field, value)?;
            let rendered =
                format_micro_timestamp(micros).ok_or_else(|| CorrectionError::OutOfRange {
                    field: field.to_string(),
                    value: value.to_string(),
                })?;
            Ok(Value::String(rendered))
        }
    }
}

/// Overlay `corrected` on `image`. Corrected values always win; keys keep
/// their position in the image.
fn merge_corrections(mut image: FlatRecord, corrected: Vec<(String, Value)>) -> FlatRecord {
    for (name, value) in corrected {
        image.insert(name, value);
    }
    image
}

fn candidate_image(envelope: &CdcEnvelope) -> Option<FlatRecord> {
    let payload = &envelope.payload;
    let op_ts = payload
        .ts_ms
        .clone()
        .map(Value::Number)
        .unwrap_or(Value::Null);

    if let Some(after) = &payload.after {
        let mut image = after.clone();
        image.insert(reserved::OP_TS.to_string(), op_ts);
        return Some(image);
    }

    if let Some(before) = &payload.before {
        let mut image = before.clone();
        image.insert(reserved::OP_TS.to_string(), op_ts);
        image.insert(reserved::RECORD_REMOVED.to_string(), Value::Bool(true));
        return Some(image);
    }

    None
}

fn normalize_envelope(
    envelope: &CdcEnvelope,
    corrections: &Corrections,
) -> Result<NormalizeOutcome, CorrectionError> {
    let Some(image) = candidate_image(envelope) else {
        return Ok(NormalizeOutcome::Skip(SkipReason::NoImage));
    };

    let mut corrected = Vec::with_capacity(corrections.len());
    for correction in corrections.iter() {
        // Suffix-only matches are selected but keep their value.
        let Some(logical_type) = correction.logical_type else {
            continue;
        };
        match image.get(&correction.name) {
            Some(value) if !value.is_null() => {
                let fixed = correct_value(&correction.name, logical_type, value)?;
                corrected.push((correction.name.clone(), fixed));
            }
            _ => {}
        }
    }

    Ok(NormalizeOutcome::Emit(merge_corrections(image, corrected)))
}

/// Normalize a typed envelope.
pub fn normalize(
    envelope: &CdcEnvelope,
    corrections: &Corrections,
) -> Result<NormalizeOutcome, NormalizationFailure> {
    normalize_envelope(envelope, corrections).map_err(|cause| {
        let record = serde_json::to_value(envelope).unwrap_or(Value::Null);
        NormalizationFailure::new(&record, cause)
    })
}

/// Decode the payload of a raw message and normalize it.
///
/// The schema part is not decoded here; it only feeds the classifier. Any
/// failure, decoding included, is reported with the raw record.
pub fn normalize_value(
    message: &Value,
    corrections: &Corrections,
) -> Result<NormalizeOutcome, NormalizationFailure> {
    let payload = message
        .get("payload")
        .ok_or_else(|| NormalizationFailure::new(message, "message has no 'payload'"))?;
    let envelope = CdcEnvelope {
        schema: None,
        payload: CdcPayload::deserialize(payload)
            .map_err(|e| NormalizationFailure::new(message, e))?,
    };

    normalize_envelope(&envelope, corrections).map_err(|e| NormalizationFailure::new(message, e))
}
