//! Operation record and payload definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Consumer-defined operation kind.
pub type Opcode = i64;

/// Insertion sequence assigned by the durable store.
pub type Sequence = i64;

/// Opaque key-value bag handed to the handler verbatim.
pub type Payload = HashMap<String, PayloadValue>;

/// A scalar payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PayloadValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PayloadValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PayloadValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Integer(value)
    }
}

impl From<f64> for PayloadValue {
    fn from(value: f64) -> Self {
        PayloadValue::Float(value)
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

/// A pending operation as held by the store and the run list.
///
/// Records are never mutated after insertion; a record leaves the store only
/// once the handler has finished with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Durable FIFO position.
    pub sequence: Sequence,
    pub opcode: Opcode,
    pub payload: Option<Payload>,
}

impl OperationRecord {
    pub fn new(sequence: Sequence, opcode: Opcode, payload: Option<Payload>) -> Self {
        Self {
            sequence,
            opcode,
            payload,
        }
    }
}

/// Reject values that would not come back unchanged from the store.
///
/// JSON cannot represent NaN or infinities; serde_json writes them as `null`.
pub fn validate_payload(payload: Option<&Payload>) -> Result<(), QueueError> {
    let Some(payload) = payload else {
        return Ok(());
    };
    for (key, value) in payload {
        if let PayloadValue::Float(f) = value {
            if !f.is_finite() {
                return Err(QueueError::InvalidPayload(format!(
                    "field {:?} holds non-finite float {}",
                    key, f
                )));
            }
        }
    }
    Ok(())
}

/// Encode a payload as the JSON text kept in the store.
pub(crate) fn encode_payload(payload: Option<&Payload>) -> Result<Option<String>, QueueError> {
    validate_payload(payload)?;
    Ok(payload.map(serde_json::to_string).transpose()?)
}

/// Decode stored JSON text back into a payload.
pub(crate) fn decode_payload(text: Option<&str>) -> Result<Option<Payload>, serde_json::Error> {
    text.map(serde_json::from_str).transpose()
}
