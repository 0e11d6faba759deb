//! PostgreSQL session for the `MessageStore` adapter
//!
//! Executes message store statements against a database with the Message DB
//! functions installed, using a sqlx connection pool.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::future::Future;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use messagestore_types::{BackendError, Cell, Param, Row, Session, Statement};
use nutype::nutype;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row as _, TypeInfo, ValueRef};
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Error type for establishing a Postgres session.
#[derive(Debug, Error)]
pub enum PostgresSessionError {
    #[error("invalid postgres connection string")]
    InvalidConnectionString(#[source] sqlx::Error),
    #[error("failed to connect to postgres")]
    ConnectionFailed(#[source] sqlx::Error),
}

/// Maximum number of database connections in the pool.
///
/// Must be at least 1, enforced by using `NonZeroU32` as the underlying type.
///
/// # Examples
///
/// ```ignore
/// use messagestore_postgres::MaxConnections;
/// use std::num::NonZeroU32;
///
/// let small_pool = MaxConnections::new(NonZeroU32::new(5).expect("5 is non-zero"));
/// let large_pool = MaxConnections::new(NonZeroU32::new(50).expect("50 is non-zero"));
/// ```
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(NonZeroU32);

/// Schema holding the message store tables and functions.
pub const DEFAULT_SCHEMA: &str = "message_store";

/// Configuration for the `PostgresSession` connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: MaxConnections,
    /// Timeout for acquiring a connection from the pool (default: 30 seconds)
    pub acquire_timeout: Duration,
    /// Idle timeout for connections in the pool (default: 10 minutes)
    pub idle_timeout: Duration,
    /// Schema put on every connection's `search_path` (default: `message_store`)
    pub schema: String,
    /// Allow SQL conditions on reads (default: false)
    pub sql_condition: bool,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        const DEFAULT_MAX_CONNECTIONS: NonZeroU32 = match NonZeroU32::new(10) {
            Some(v) => v,
            None => unreachable!(),
        };

        Self {
            max_connections: MaxConnections::new(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600), // 10 minutes
            schema: DEFAULT_SCHEMA.to_string(),
            sql_condition: false,
        }
    }
}

impl PostgresConfig {
    pub fn with_max_connections(mut self, max_connections: MaxConnections) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Turn on `message_store.sql_condition` for every connection.
    pub fn with_sql_condition(mut self, enabled: bool) -> Self {
        self.sql_condition = enabled;
        self
    }

    fn connect_options(&self, connection_string: &str) -> Result<PgConnectOptions, sqlx::Error> {
        let options =
            PgConnectOptions::from_str(connection_string)?.options([("search_path", &self.schema)]);

        Ok(if self.sql_condition {
            options.options([("message_store.sql_condition", "on")])
        } else {
            options
        })
    }
}

/// A message store session backed by a Postgres connection pool.
///
/// Cloning is cheap and clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresSession {
    pool: Pool<Postgres>,
}

impl PostgresSession {
    /// Connect with default configuration.
    pub async fn connect<S: Into<String>>(
        connection_string: S,
    ) -> Result<Self, PostgresSessionError> {
        Self::with_config(connection_string, PostgresConfig::default()).await
    }

    /// Connect with custom configuration.
    #[instrument(name = "postgres.connect", skip_all, fields(schema = %config.schema))]
    pub async fn with_config<S: Into<String>>(
        connection_string: S,
        config: PostgresConfig,
    ) -> Result<Self, PostgresSessionError> {
        let connection_string = connection_string.into();
        let connect_options = config
            .connect_options(&connection_string)
            .map_err(PostgresSessionError::InvalidConnectionString)?;
        let max_connections: NonZeroU32 = config.max_connections.into();

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|error| {
                error!(error = %error, "[postgres.connect] failed to connect");
                PostgresSessionError::ConnectionFailed(error)
            })?;

        info!(
            max_connections = %config.max_connections,
            sql_condition = config.sql_condition,
            "[postgres.connect] connection pool ready"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing connection pool.
    ///
    /// The pool's connections must already have the message store schema on
    /// their `search_path`.
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Check that a connection can be acquired and used.
    pub async fn ping(&self) -> Result<(), PostgresSessionError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(PostgresSessionError::ConnectionFailed)
    }

    #[instrument(
        name = "postgres.execute",
        skip_all,
        fields(procedure = %statement.procedure())
    )]
    async fn run(&self, statement: &Statement) -> Result<Vec<Row>, BackendError> {
        let mut query = sqlx::query(statement.sql());
        for param in statement.params() {
            query = match param {
                Param::Text(value) => query.bind(value.clone()),
                Param::Integer(value) => query.bind(*value),
            };
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend_error)?;

        debug!(
            rows = rows.len(),
            "[postgres.execute] statement executed"
        );

        rows.iter().map(decode_row).collect()
    }
}

impl Session for PostgresSession {
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = Result<Vec<Row>, BackendError>> + Send {
        self.run(statement)
    }
}

/// Keep the server's own message text, which carries the conflict prefix.
fn backend_error(error: sqlx::Error) -> BackendError {
    let message = match &error {
        sqlx::Error::Database(database_error) => database_error.message().to_string(),
        other => other.to_string(),
    };
    BackendError::with_source(message, error)
}

fn decode_row(row: &PgRow) -> Result<Row, BackendError> {
    row.columns()
        .iter()
        .map(|column| decode_cell(row, column.ordinal(), column.type_info().name()))
        .collect::<Result<Vec<_>, _>>()
        .map(Row::new)
}

fn decode_cell(row: &PgRow, index: usize, type_name: &str) -> Result<Cell, BackendError> {
    if row.try_get_raw(index).map_err(backend_error)?.is_null() {
        return Ok(Cell::Null);
    }

    let cell = match type_name {
        "VARCHAR" | "TEXT" | "BPCHAR" | "NAME" => Cell::Text(get::<String>(row, index)?),
        "UUID" => Cell::Text(get::<Uuid>(row, index)?.to_string()),
        "JSON" | "JSONB" => Cell::Text(get::<Value>(row, index)?.to_string()),
        "INT2" => Cell::Integer(i64::from(get::<i16>(row, index)?)),
        "INT4" => Cell::Integer(i64::from(get::<i32>(row, index)?)),
        "INT8" => Cell::Integer(get::<i64>(row, index)?),
        "TIMESTAMP" => Cell::Timestamp(get::<NaiveDateTime>(row, index)?),
        "TIMESTAMPTZ" => Cell::Timestamp(get::<DateTime<Utc>>(row, index)?.naive_utc()),
        other => {
            return Err(BackendError::new(format!(
                "unsupported column type {other} at index {index}"
            )))
        }
    };

    Ok(cell)
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<T, BackendError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(index).map_err(backend_error)
}
