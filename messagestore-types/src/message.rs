use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{CodecError, PayloadField};
use crate::stream_name::StreamName;

/// A message to append to a stream.
///
/// `id` is optional: when absent, `put` generates one with the configured
/// [`IdGenerator`](crate::IdGenerator). Metadata defaults to an empty object.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteMessage {
    /// Explicit message id; generated at append time when `None`.
    pub id: Option<Uuid>,
    /// Message type name, e.g. `ItemAdded`.
    pub message_type: String,
    /// Data payload.
    pub data: Value,
    /// Metadata payload.
    pub metadata: Value,
}

impl WriteMessage {
    /// Message with no id and empty metadata.
    pub fn new(message_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: None,
            message_type: message_type.into(),
            data,
            metadata: Value::Object(Map::new()),
        }
    }

    /// Build a message whose data is the JSON form of `payload`.
    pub fn from_payload<T: Serialize>(
        message_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, CodecError> {
        let data = serde_json::to_value(payload).map_err(|source| CodecError::MalformedPayload {
            field: PayloadField::Data,
            source,
        })?;

        Ok(Self::new(message_type, data))
    }

    /// Use `id` instead of a generated one.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Replace the metadata payload.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A decoded message before it is frozen into a [`ReadMessage`].
///
/// This is the value handed to a [`ReadTransform`](crate::ReadTransform),
/// which may normalize or enrich any field.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    /// Message id.
    pub id: Uuid,
    /// Stream the message was written to.
    pub stream_name: StreamName,
    /// Message type name.
    pub message_type: String,
    /// Zero-based position within the stream.
    pub position: u64,
    /// Position across the whole store.
    pub global_position: u64,
    /// Decoded data payload.
    pub data: Value,
    /// Decoded metadata payload.
    pub metadata: Value,
    /// When the backend recorded the message.
    pub time: DateTime<Utc>,
}

/// A message read back from the store.
///
/// `position` is the zero-based position within its stream; `global_position`
/// orders the message across the whole store.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadMessage {
    id: Uuid,
    stream_name: StreamName,
    message_type: String,
    position: u64,
    global_position: u64,
    data: Value,
    metadata: Value,
    time: DateTime<Utc>,
}

impl ReadMessage {
    /// Message id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stream the message belongs to.
    pub fn stream_name(&self) -> &StreamName {
        &self.stream_name
    }

    /// Message type name.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Zero-based position within the stream.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Position across the whole store.
    pub fn global_position(&self) -> u64 {
        self.global_position
    }

    /// Data payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Metadata payload.
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// When the backend recorded the message.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Deserialize the data payload into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        T::deserialize(&self.data).map_err(|source| CodecError::MalformedPayload {
            field: PayloadField::Data,
            source,
        })
    }

    /// Deserialize the metadata payload into a typed value.
    pub fn metadata_as<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        T::deserialize(&self.metadata).map_err(|source| CodecError::MalformedPayload {
            field: PayloadField::Metadata,
            source,
        })
    }
}

impl From<MessageRecord> for ReadMessage {
    fn from(record: MessageRecord) -> Self {
        let MessageRecord {
            id,
            stream_name,
            message_type,
            position,
            global_position,
            data,
            metadata,
            time,
        } = record;

        Self {
            id,
            stream_name,
            message_type,
            position,
            global_position,
            data,
            metadata,
            time,
        }
    }
}
