//! In-memory session for the `MessageStore` adapter
//!
//! This crate provides an in-memory implementation of the `Session` trait
//! that answers the four message store procedures the way a Message DB
//! backend does, useful for testing and development scenarios where
//! persistence is not required. Failures carry the same message text as the
//! database functions, so version conflict detection behaves identically.
//!
//! SQL conditions cannot be evaluated without a SQL engine; reads that carry
//! one fail as they would against a database with conditions turned off.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use messagestore_types::stream_name;
use messagestore_types::{BackendError, Cell, Param, Procedure, Row, Session, Statement};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

/// Stream version reported for a stream with no messages.
const NO_STREAM: i64 = -1;

#[derive(Debug, Clone)]
struct StoredMessage {
    id: Uuid,
    stream_name: String,
    message_type: String,
    position: i64,
    global_position: i64,
    data: Option<Value>,
    metadata: Option<Value>,
    time: NaiveDateTime,
}

impl StoredMessage {
    fn to_row(&self) -> Row {
        Row::new(vec![
            Cell::Text(self.id.to_string()),
            Cell::Text(self.stream_name.clone()),
            Cell::Text(self.message_type.clone()),
            Cell::Integer(self.position),
            Cell::Integer(self.global_position),
            json_cell(self.data.as_ref()),
            json_cell(self.metadata.as_ref()),
            Cell::Timestamp(self.time),
        ])
    }
}

#[derive(Debug, Default)]
struct State {
    // Ordered by global position
    messages: Vec<StoredMessage>,
    ids: HashSet<Uuid>,
    versions: HashMap<String, i64>,
}

/// Thread-safe in-memory message store session for testing.
///
/// Clones share the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySession {
    state: Arc<Mutex<State>>,
}

impl InMemorySession {
    /// Create a new empty in-memory session
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages across all streams.
    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Position of the last message in `stream_name`, if any.
    pub fn stream_version(&self, stream_name: &str) -> Option<u64> {
        self.state
            .lock()
            .versions
            .get(stream_name)
            .and_then(|version| u64::try_from(*version).ok())
    }

    fn run(&self, statement: &Statement) -> Result<Vec<Row>, BackendError> {
        let params = statement.params();
        match statement.procedure() {
            Procedure::WriteMessage => self.write_message(params),
            Procedure::GetStreamMessages => self.get_stream_messages(params),
            Procedure::GetCategoryMessages => self.get_category_messages(params),
            Procedure::GetLastStreamMessage => self.get_last_stream_message(params),
        }
    }

    fn write_message(&self, params: &[Param]) -> Result<Vec<Row>, BackendError> {
        let id = required_text(params, 0, "id")?;
        let stream_name = required_text(params, 1, "stream_name")?;
        let message_type = required_text(params, 2, "type")?;
        let data = json_param(params, 3)?;
        let metadata = json_param(params, 4)?;
        let expected_version = integer(params, 5)?;

        let id = Uuid::parse_str(id).map_err(|_| {
            BackendError::new(format!("invalid input syntax for type uuid: \"{id}\""))
        })?;

        let mut state = self.state.lock();

        let stream_version = state
            .versions
            .get(stream_name)
            .copied()
            .unwrap_or(NO_STREAM);

        if let Some(expected_version) = expected_version {
            if expected_version != stream_version {
                debug!(
                    stream_name,
                    expected_version,
                    stream_version,
                    "[memory.write_message] expected version mismatch"
                );
                return Err(BackendError::new(format!(
                    "Wrong expected version: {expected_version} (Stream: {stream_name}, Stream Version: {stream_version})"
                )));
            }
        }

        if state.ids.contains(&id) {
            return Err(BackendError::new(
                "duplicate key value violates unique constraint \"messages_id\"",
            ));
        }

        let position = stream_version + 1;
        let global_position = i64::try_from(state.messages.len())
            .map_err(|_| BackendError::new("global position out of range"))?
            + 1;

        state.ids.insert(id);
        state.versions.insert(stream_name.to_string(), position);
        state.messages.push(StoredMessage {
            id,
            stream_name: stream_name.to_string(),
            message_type: message_type.to_string(),
            position,
            global_position,
            data,
            metadata,
            time: Utc::now().naive_utc(),
        });

        trace!(
            stream_name,
            position,
            global_position,
            "[memory.write_message] message written"
        );

        Ok(vec![Row::new(vec![Cell::Integer(global_position)])])
    }

    fn get_stream_messages(&self, params: &[Param]) -> Result<Vec<Row>, BackendError> {
        let stream_name = required_text(params, 0, "stream_name")?;
        let position = integer(params, 1)?.unwrap_or(0);
        let batch_size = integer(params, 2)?.unwrap_or(1000);
        reject_condition(params, 3)?;

        if stream_name::is_category(stream_name) {
            return Err(BackendError::new(format!(
                "Must be a stream name: {stream_name}"
            )));
        }

        let state = self.state.lock();
        let rows = limit(
            state
                .messages
                .iter()
                .filter(|message| message.stream_name == stream_name)
                .filter(|message| message.position >= position),
            batch_size,
        );

        trace!(stream_name, count = rows.len(), "[memory.get_stream_messages] read");
        Ok(rows)
    }

    fn get_category_messages(&self, params: &[Param]) -> Result<Vec<Row>, BackendError> {
        let category = required_text(params, 0, "category")?;
        let position = integer(params, 1)?.unwrap_or(1);
        let batch_size = integer(params, 2)?.unwrap_or(1000);
        reject_condition(params, 3)?;

        if !stream_name::is_category(category) {
            return Err(BackendError::new(format!("Must be a category: {category}")));
        }

        let state = self.state.lock();
        let rows = limit(
            state
                .messages
                .iter()
                .filter(|message| stream_name::category(&message.stream_name) == category)
                .filter(|message| message.global_position >= position),
            batch_size,
        );

        trace!(category, count = rows.len(), "[memory.get_category_messages] read");
        Ok(rows)
    }

    fn get_last_stream_message(&self, params: &[Param]) -> Result<Vec<Row>, BackendError> {
        let stream_name = required_text(params, 0, "stream_name")?;

        let state = self.state.lock();
        Ok(state
            .messages
            .iter()
            .rev()
            .find(|message| message.stream_name == stream_name)
            .map(StoredMessage::to_row)
            .into_iter()
            .collect())
    }
}

impl Session for InMemorySession {
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = Result<Vec<Row>, BackendError>> + Send {
        std::future::ready(self.run(statement))
    }
}

// A negative batch size reads everything, as in the database functions.
fn limit<'a>(messages: impl Iterator<Item = &'a StoredMessage>, batch_size: i64) -> Vec<Row> {
    let take = usize::try_from(batch_size).unwrap_or(usize::MAX);
    messages.take(take).map(StoredMessage::to_row).collect()
}

fn json_cell(value: Option<&Value>) -> Cell {
    value.map_or(Cell::Null, |value| Cell::Text(value.to_string()))
}

fn text(params: &[Param], index: usize) -> Result<Option<&str>, BackendError> {
    match params.get(index) {
        Some(Param::Text(value)) => Ok(value.as_deref()),
        Some(Param::Integer(_)) => Err(BackendError::new(format!(
            "parameter ${} must be text",
            index + 1
        ))),
        None => Err(missing(params, index)),
    }
}

fn required_text<'a>(
    params: &'a [Param],
    index: usize,
    column: &str,
) -> Result<&'a str, BackendError> {
    text(params, index)?.ok_or_else(|| {
        BackendError::new(format!(
            "null value in column \"{column}\" violates not-null constraint"
        ))
    })
}

fn integer(params: &[Param], index: usize) -> Result<Option<i64>, BackendError> {
    match params.get(index) {
        Some(Param::Integer(value)) => Ok(*value),
        Some(Param::Text(_)) => Err(BackendError::new(format!(
            "parameter ${} must be bigint",
            index + 1
        ))),
        None => Err(missing(params, index)),
    }
}

fn json_param(params: &[Param], index: usize) -> Result<Option<Value>, BackendError> {
    text(params, index)?
        .map(|raw| {
            serde_json::from_str(raw).map_err(|error| {
                BackendError::with_source("invalid input syntax for type json", error)
            })
        })
        .transpose()
}

fn reject_condition(params: &[Param], index: usize) -> Result<(), BackendError> {
    let condition = params.get(index).ok_or_else(|| missing(params, index))?;
    if condition.is_null() {
        Ok(())
    } else {
        Err(BackendError::new(
            "Retrieval with SQL condition is not activated",
        ))
    }
}

fn missing(params: &[Param], index: usize) -> BackendError {
    BackendError::new(format!(
        "bind message supplies {} parameters, but statement requires at least {}",
        params.len(),
        index + 1
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRITE: &str = "SELECT write_message($1, $2, $3, $4, $5, $6);";
    const STREAM: &str = "SELECT * FROM get_stream_messages($1, $2, $3, $4);";
    const CATEGORY: &str = "SELECT * FROM get_category_messages($1, $2, $3, $4);";
    const LAST: &str = "SELECT * FROM get_last_stream_message($1);";

    fn text(value: &str) -> Param {
        Param::Text(Some(value.to_string()))
    }

    fn write(stream_name: &str, expected_version: Option<i64>) -> Statement {
        write_with_id(Uuid::new_v4(), stream_name, expected_version)
    }

    fn write_with_id(id: Uuid, stream_name: &str, expected_version: Option<i64>) -> Statement {
        Statement::new(
            Procedure::WriteMessage,
            WRITE,
            vec![
                text(&id.to_string()),
                text(stream_name),
                text("Added"),
                text(r#"{"qty":1}"#),
                text("{}"),
                Param::Integer(expected_version),
            ],
        )
    }

    fn read(procedure: Procedure, sql: &'static str, name: &str, position: i64) -> Statement {
        Statement::new(
            procedure,
            sql,
            vec![
                text(name),
                Param::Integer(Some(position)),
                Param::Integer(Some(1000)),
                Param::Text(None),
            ],
        )
    }

    fn global_position(rows: &[Row]) -> i64 {
        rows[0].integer(0, "global_position").expect("integer")
    }

    #[tokio::test]
    async fn write_returns_increasing_global_positions() {
        let session = InMemorySession::new();

        let first = session.execute(&write("cart-1", None)).await.expect("write");
        let second = session.execute(&write("cart-2", None)).await.expect("write");

        assert_eq!(global_position(&first), 1);
        assert_eq!(global_position(&second), 2);
        assert_eq!(session.message_count(), 2);
    }

    #[tokio::test]
    async fn stream_positions_start_at_zero_per_stream() {
        let session = InMemorySession::new();
        for _ in 0..3 {
            session.execute(&write("cart-1", None)).await.expect("write");
        }
        session.execute(&write("cart-2", None)).await.expect("write");

        assert_eq!(session.stream_version("cart-1"), Some(2));
        assert_eq!(session.stream_version("cart-2"), Some(0));
        assert_eq!(session.stream_version("cart-3"), None);
    }

    #[tokio::test]
    async fn mismatched_expected_version_uses_database_message() {
        let session = InMemorySession::new();
        session.execute(&write("cart-1", Some(-1))).await.expect("first write");

        let error = session
            .execute(&write("cart-1", Some(-1)))
            .await
            .expect_err("stream exists");

        insta::assert_snapshot!(
            error.message(),
            @"Wrong expected version: -1 (Stream: cart-1, Stream Version: 0)"
        );
        assert_eq!(session.message_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let session = InMemorySession::new();
        let id = Uuid::new_v4();
        session.execute(&write_with_id(id, "cart-1", None)).await.expect("write");

        let error = session
            .execute(&write_with_id(id, "cart-2", None))
            .await
            .expect_err("duplicate id");

        assert!(error.message().starts_with("duplicate key value"));
    }

    #[tokio::test]
    async fn stream_read_filters_by_position() {
        let session = InMemorySession::new();
        for _ in 0..4 {
            session.execute(&write("cart-1", None)).await.expect("write");
        }

        let rows = session
            .execute(&read(Procedure::GetStreamMessages, STREAM, "cart-1", 2))
            .await
            .expect("read");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].integer(3, "position").expect("position"), 2);
        assert_eq!(rows[0].len(), 8);
    }

    #[tokio::test]
    async fn category_read_spans_streams_by_global_position() {
        let session = InMemorySession::new();
        session.execute(&write("cart-1", None)).await.expect("write");
        session.execute(&write("order-1", None)).await.expect("write");
        session.execute(&write("cart-2", None)).await.expect("write");

        let rows = session
            .execute(&read(Procedure::GetCategoryMessages, CATEGORY, "cart", 1))
            .await
            .expect("read");

        let streams: Vec<_> = rows
            .iter()
            .map(|row| row.text(1, "stream_name").expect("name").to_string())
            .collect();
        assert_eq!(streams, ["cart-1", "cart-2"]);
    }

    #[tokio::test]
    async fn stream_read_rejects_category_name() {
        let session = InMemorySession::new();

        let error = session
            .execute(&read(Procedure::GetStreamMessages, STREAM, "cart", 0))
            .await
            .expect_err("category");

        assert_eq!(error.message(), "Must be a stream name: cart");
    }

    #[tokio::test]
    async fn condition_is_not_activated() {
        let session = InMemorySession::new();
        let statement = Statement::new(
            Procedure::GetStreamMessages,
            STREAM,
            vec![
                text("cart-1"),
                Param::Integer(Some(0)),
                Param::Integer(Some(10)),
                text("(position > 1)"),
            ],
        );

        let error = session.execute(&statement).await.expect_err("condition");

        assert_eq!(error.message(), "Retrieval with SQL condition is not activated");
    }

    #[tokio::test]
    async fn last_message_is_highest_position() {
        let session = InMemorySession::new();
        let last = Statement::new(Procedure::GetLastStreamMessage, LAST, vec![text("cart-1")]);

        assert!(session.execute(&last).await.expect("read").is_empty());

        session.execute(&write("cart-1", None)).await.expect("write");
        session.execute(&write("cart-1", None)).await.expect("write");

        let rows = session.execute(&last).await.expect("read");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].integer(3, "position").expect("position"), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_a_backend_error() {
        let session = InMemorySession::new();
        let statement = Statement::new(
            Procedure::WriteMessage,
            WRITE,
            vec![
                text(&Uuid::new_v4().to_string()),
                text("cart-1"),
                text("Added"),
                text("{qty"),
                text("{}"),
                Param::Integer(None),
            ],
        );

        let error = session.execute(&statement).await.expect_err("bad json");

        assert_eq!(error.message(), "invalid input syntax for type json");
        assert_eq!(session.message_count(), 0);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let session = InMemorySession::new();
        let clone = session.clone();

        clone.execute(&write("cart-1", None)).await.expect("write");

        assert_eq!(session.message_count(), 1);
    }
}
