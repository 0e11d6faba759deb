use std::error::Error as StdError;
use std::fmt;

/// Error type returned by message store operations.
///
/// Exactly one backend failure is recognized: a rejected expected version.
/// Every other backend failure is carried through as [`BackendError`] without
/// reclassification.
#[derive(thiserror::Error, Debug)]
pub enum MessageStoreError {
    /// The append's expected version did not match the stream's last position
    /// at commit time.
    ///
    /// Callers typically recover by re-reading the stream version,
    /// recomputing, and appending again. `message` is the backend's original
    /// text.
    #[error("version conflict: {message}")]
    VersionConflict {
        message: String,
        #[source]
        source: BackendError,
    },

    /// Stored data could not be decoded into a message.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Any other backend failure, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl MessageStoreError {
    /// True for [`MessageStoreError::VersionConflict`].
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Failure reported by a session while executing a statement.
///
/// `message` is the text reported by the backend itself (for Postgres, the
/// server's error message), which is what conflict detection inspects. The
/// original error, when there is one, is kept as the source.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original backend error, for inspection or downcasting.
    pub fn original(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

/// Which payload of a message failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    Data,
    Metadata,
}

impl fmt::Display for PayloadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadField::Data => write!(f, "data"),
            PayloadField::Metadata => write!(f, "metadata"),
        }
    }
}

/// Data-integrity failures while turning stored rows into messages.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// Stored payload text is not valid JSON, or does not fit the requested type.
    #[error("malformed {field} payload: {source}")]
    MalformedPayload {
        field: PayloadField,
        #[source]
        source: serde_json::Error,
    },

    /// The row does not have the expected number of columns.
    #[error("expected {expected} columns, row has {actual}")]
    ColumnCount { expected: usize, actual: usize },

    /// A column holds a value of the wrong kind.
    #[error("column {index} ({column}) expected {expected}, found {found}")]
    UnexpectedCell {
        index: usize,
        column: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// The stored id is not a UUID.
    #[error("invalid message id {value:?}")]
    InvalidMessageId { value: String },

    /// The stored stream name is empty or blank.
    #[error("invalid stream name {value:?}")]
    InvalidStreamName { value: String },

    /// A position column holds a negative number.
    #[error("column {column} holds negative value {value}")]
    NegativePosition { column: &'static str, value: i64 },
}
