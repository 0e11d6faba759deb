use std::fmt;
use std::sync::Arc;

use nutype::nutype;
use uuid::Uuid;

use crate::message::MessageRecord;

/// Maximum number of messages returned by a single read.
///
/// Must be at least 1. Defaults to 1000.
///
/// # Examples
///
/// ```ignore
/// use messagestore_types::BatchSize;
///
/// let small = BatchSize::try_new(2).expect("2 is a valid batch size");
/// assert_eq!(u32::from(BatchSize::default()), 1000);
/// assert!(BatchSize::try_new(0).is_err());
/// ```
#[nutype(
    validate(greater = 0),
    default = 1000,
    derive(Debug, Clone, Copy, PartialEq, Eq, Display, Into, Default)
)]
pub struct BatchSize(u32);

/// Optimistic concurrency expectation for an append.
///
/// Absence of an expectation (`None` in [`PutOptions`]) means no check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The stream must have no messages.
    NoStream,
    /// The stream's last message must be at this position.
    Version(u64),
}

impl ExpectedVersion {
    /// Backend value meaning "no prior messages".
    pub const NO_STREAM: i64 = -1;

    /// The value the backend compares against the stream's last position.
    pub fn canonical(self) -> i64 {
        match self {
            ExpectedVersion::NoStream => Self::NO_STREAM,
            ExpectedVersion::Version(position) => i64::try_from(position).unwrap_or(i64::MAX),
        }
    }
}

impl From<u64> for ExpectedVersion {
    fn from(position: u64) -> Self {
        ExpectedVersion::Version(position)
    }
}

/// Raw filter fragment evaluated by the backend during a read.
///
/// The fragment is wrapped in parentheses before it is sent so that it
/// composes safely with the backend's own predicates. The backend must have
/// condition retrieval enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition(String);

impl Condition {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self(fragment.into())
    }

    /// The fragment as given.
    pub fn fragment(&self) -> &str {
        &self.0
    }

    /// The fragment in parentheses, as bound to the backend.
    pub fn wrapped(&self) -> String {
        format!("({})", self.0)
    }
}

/// Produces ids for messages appended without one.
///
/// Defaults to random (v4) UUIDs.
#[derive(Clone)]
pub struct IdGenerator(Arc<dyn Fn() -> Uuid + Send + Sync>);

impl IdGenerator {
    /// Generator backed by `generate`.
    pub fn new(generate: impl Fn() -> Uuid + Send + Sync + 'static) -> Self {
        Self(Arc::new(generate))
    }

    /// Random v4 UUIDs.
    pub fn random() -> Self {
        Self::new(Uuid::new_v4)
    }

    /// Next id.
    pub fn generate(&self) -> Uuid {
        (self.0)()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::random()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdGenerator")
    }
}

/// Hook applied to every decoded record before it becomes a `ReadMessage`.
///
/// Defaults to the identity.
#[derive(Clone)]
pub struct ReadTransform(Arc<dyn Fn(MessageRecord) -> MessageRecord + Send + Sync>);

impl ReadTransform {
    pub fn new(transform: impl Fn(MessageRecord) -> MessageRecord + Send + Sync + 'static) -> Self {
        Self(Arc::new(transform))
    }

    /// Leaves every record unchanged.
    pub fn identity() -> Self {
        Self::new(|record| record)
    }

    /// Run the hook on one record.
    pub fn apply(&self, record: MessageRecord) -> MessageRecord {
        (self.0)(record)
    }
}

impl Default for ReadTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for ReadTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReadTransform")
    }
}

/// Options for reading a window of messages.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// First position to return. Compared against `position` for entity
    /// streams and `global_position` for category streams.
    pub position: u64,
    /// Maximum number of messages returned.
    pub batch_size: BatchSize,
    /// Extra backend filter.
    pub condition: Option<Condition>,
    /// Applied to each decoded record.
    pub transform: ReadTransform,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start reading at `position`.
    pub fn with_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    /// Return at most `batch_size` messages.
    pub fn with_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Filter with `condition`.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Apply `transform` to every message read.
    pub fn with_transform(mut self, transform: ReadTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Options for reading the last message of a stream.
#[derive(Debug, Clone, Default)]
pub struct GetLastOptions {
    /// Applied to the decoded record.
    pub transform: ReadTransform,
}

impl GetLastOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transform(mut self, transform: ReadTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Options for appending a message.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Required stream version; `None` skips the check.
    pub expected_version: Option<ExpectedVersion>,
    /// Source of ids for messages without one.
    pub id_generator: IdGenerator,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the stream to be at `expected_version`.
    pub fn with_expected_version(mut self, expected_version: impl Into<ExpectedVersion>) -> Self {
        self.expected_version = Some(expected_version.into());
        self
    }

    /// Generate missing ids with `id_generator`.
    pub fn with_id_generator(mut self, id_generator: IdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }
}
