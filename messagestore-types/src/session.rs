use std::fmt;
use std::future::Future;

use chrono::NaiveDateTime;

use crate::errors::{BackendError, CodecError};

/// The backend primitive a statement invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    /// Append one message with an optional expected version check.
    WriteMessage,
    /// Read a window of one entity stream.
    GetStreamMessages,
    /// Read a window across every stream of a category.
    GetCategoryMessages,
    /// Read the last message of one stream.
    GetLastStreamMessage,
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::WriteMessage => write!(f, "write_message"),
            Procedure::GetStreamMessages => write!(f, "get_stream_messages"),
            Procedure::GetCategoryMessages => write!(f, "get_category_messages"),
            Procedure::GetLastStreamMessage => write!(f, "get_last_stream_message"),
        }
    }
}

/// A positional statement parameter.
///
/// NULLs keep their SQL type so they can be bound without inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// `varchar`/`jsonb` text, or a typed NULL.
    Text(Option<String>),
    /// `bigint`, or a typed NULL.
    Integer(Option<i64>),
}

impl Param {
    /// True for a NULL of either type.
    pub fn is_null(&self) -> bool {
        matches!(self, Param::Text(None) | Param::Integer(None))
    }
}

/// A parameterized call to one backend primitive.
///
/// `sql` is the fixed template sent to SQL backends; `procedure` identifies
/// the same call for backends that do not speak SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    procedure: Procedure,
    sql: &'static str,
    params: Vec<Param>,
}

impl Statement {
    /// Statement calling `procedure` through the `sql` template.
    pub fn new(procedure: Procedure, sql: &'static str, params: Vec<Param>) -> Self {
        Self {
            procedure,
            sql,
            params,
        }
    }

    /// The primitive this statement calls.
    pub fn procedure(&self) -> Procedure {
        self.procedure
    }

    /// SQL template with `$n` placeholders.
    pub fn sql(&self) -> &'static str {
        self.sql
    }

    /// Parameters in placeholder order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// One column value of a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// SQL NULL.
    Null,
    /// Any textual column, including uuid and json.
    Text(String),
    /// Any integer column.
    Integer(i64),
    /// Timestamp without time zone, in UTC.
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// Short name of the value kind, for error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Text(_) => "text",
            Cell::Integer(_) => "integer",
            Cell::Timestamp(_) => "timestamp",
        }
    }
}

/// A raw result row, columns in the order the backend returned them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Non-null text at `index`.
    pub fn text(&self, index: usize, column: &'static str) -> Result<&str, CodecError> {
        match self.cell(index)? {
            Cell::Text(value) => Ok(value),
            other => Err(unexpected(index, column, "text", other)),
        }
    }

    /// Text or null at `index`.
    pub fn optional_text(
        &self,
        index: usize,
        column: &'static str,
    ) -> Result<Option<&str>, CodecError> {
        match self.cell(index)? {
            Cell::Text(value) => Ok(Some(value)),
            Cell::Null => Ok(None),
            other => Err(unexpected(index, column, "text", other)),
        }
    }

    /// Non-null integer at `index`.
    pub fn integer(&self, index: usize, column: &'static str) -> Result<i64, CodecError> {
        match self.cell(index)? {
            Cell::Integer(value) => Ok(*value),
            other => Err(unexpected(index, column, "integer", other)),
        }
    }

    /// Integer or null at `index`.
    pub fn optional_integer(
        &self,
        index: usize,
        column: &'static str,
    ) -> Result<Option<i64>, CodecError> {
        match self.cell(index)? {
            Cell::Integer(value) => Ok(Some(*value)),
            Cell::Null => Ok(None),
            other => Err(unexpected(index, column, "integer", other)),
        }
    }

    /// Non-null timestamp at `index`.
    pub fn timestamp(
        &self,
        index: usize,
        column: &'static str,
    ) -> Result<NaiveDateTime, CodecError> {
        match self.cell(index)? {
            Cell::Timestamp(value) => Ok(*value),
            other => Err(unexpected(index, column, "timestamp", other)),
        }
    }

    fn cell(&self, index: usize) -> Result<&Cell, CodecError> {
        self.cells.get(index).ok_or(CodecError::ColumnCount {
            expected: index + 1,
            actual: self.cells.len(),
        })
    }
}

fn unexpected(index: usize, column: &'static str, expected: &'static str, found: &Cell) -> CodecError {
    CodecError::UnexpectedCell {
        index,
        column,
        expected,
        found: found.kind(),
    }
}

/// Handle to a backend that can execute message store statements.
///
/// Sessions are owned by the caller: the store borrows one per operation and
/// never opens, clones, or closes it. Implementations return rows exactly as
/// the backend produced them and report failures with the backend's own
/// message text, which is what version conflict detection inspects.
///
/// Implementations include:
/// - `messagestore-postgres`: `PostgresSession` over a sqlx connection pool
/// - `messagestore-memory`: `InMemorySession` for tests and demos
pub trait Session {
    /// Execute one statement and return its result rows.
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = Result<Vec<Row>, BackendError>> + Send;
}

/// Lets the store functions take either an owned session or a reference.
impl<T: Session + Sync> Session for &T {
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = Result<Vec<Row>, BackendError>> + Send {
        (*self).execute(statement)
    }
}
