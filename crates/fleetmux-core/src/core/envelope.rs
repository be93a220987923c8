// fleetmux-core/src/core/envelope.rs
// ============================================================================
// Module: Result Envelope & Normalizer
// Description: Uniform response envelope and heterogeneous value normalizer.
// Purpose: Convert arbitrary operation returns into transport-ready JSON.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Operations return heterogeneous values: nothing, plain text, already
//! JSON-able data, lazily produced sequences, or structured records. The
//! normalizer flattens all of them into plain JSON so every response fits the
//! uniform `{result, cmd, payload}` envelope. Failures are data: error and
//! warning envelopes are well-formed payloads, not transport faults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::error::DispatchError;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Envelope outcome kind, exactly one of three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The operation completed and any payload is its value.
    Success,
    /// The operation failed; the payload carries the failure message.
    Error,
    /// Advisory condition; the payload carries the advisory message.
    Warning,
}

// ============================================================================
// SECTION: Operation Values
// ============================================================================

/// Heterogeneous return value of an underlying capability invocation.
pub enum OpValue {
    /// No value produced.
    Unit,
    /// Plain text payload.
    Text(String),
    /// Already JSON-able payload.
    Json(Value),
    /// Lazily produced sequence, materialized in order by the normalizer.
    Stream(Box<dyn Iterator<Item = Value> + Send>),
    /// Structured record with named fields, converted to an object.
    Record(Vec<(String, Value)>),
}

/// Normalizes an operation return value into transport-ready JSON.
///
/// Streams are fully materialized into ordered arrays, records become
/// key/value objects, and everything else passes through unchanged. A unit
/// return produces no payload.
#[must_use]
pub fn normalize(value: OpValue) -> Option<Value> {
    match value {
        OpValue::Unit => None,
        OpValue::Text(text) => Some(Value::String(text)),
        OpValue::Json(value) => Some(value),
        OpValue::Stream(items) => Some(Value::Array(items.collect())),
        OpValue::Record(fields) => {
            let mut map = Map::new();
            for (key, value) in fields {
                map.insert(key, value);
            }
            Some(Value::Object(map))
        }
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Uniform response envelope returned for every dispatched command.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Outcome classification.
    pub result: Outcome,
    /// Echo of the dispatched command name.
    pub cmd: String,
    /// Normalized payload, absent unless a value or message was produced.
    pub payload: Option<Value>,
}

impl Envelope {
    /// Builds a success envelope from a normalized operation value.
    #[must_use]
    pub fn success(cmd: impl Into<String>, value: OpValue) -> Self {
        Self {
            result: Outcome::Success,
            cmd: cmd.into(),
            payload: normalize(value),
        }
    }

    /// Builds an error or warning envelope from a dispatch failure.
    #[must_use]
    pub fn failure(cmd: impl Into<String>, error: &DispatchError) -> Self {
        Self {
            result: error.outcome(),
            cmd: cmd.into(),
            payload: Some(Value::String(error.payload_message())),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
