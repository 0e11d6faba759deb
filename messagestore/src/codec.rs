//! Payload encoding between message payloads and their stored JSON text.
//!
//! Data and metadata are stored as structured documents and come back from
//! the backend as JSON text. SQL NULL decodes to `Value::Null`.

use serde_json::Value;

use crate::{CodecError, PayloadField};

/// Encode a data payload for storage.
pub fn encode_data(payload: &Value) -> String {
    encode(payload)
}

/// Encode a metadata payload for storage.
pub fn encode_metadata(payload: &Value) -> String {
    encode(payload)
}

/// Decode a stored data payload.
pub fn decode_data(wire: Option<&str>) -> Result<Value, CodecError> {
    decode(wire, PayloadField::Data)
}

/// Decode a stored metadata payload.
pub fn decode_metadata(wire: Option<&str>) -> Result<Value, CodecError> {
    decode(wire, PayloadField::Metadata)
}

fn encode(payload: &Value) -> String {
    payload.to_string()
}

fn decode(wire: Option<&str>, field: PayloadField) -> Result<Value, CodecError> {
    match wire {
        None => Ok(Value::Null),
        Some(text) => serde_json::from_str(text)
            .map_err(|source| CodecError::MalformedPayload { field, source }),
    }
}
