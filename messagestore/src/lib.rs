//! `MessageStore` - append-only, optimistically concurrent message streams
//!
//! This library reads and appends messages through a relational backend that
//! exposes Message DB style stored procedures. Callers own the session; every
//! operation borrows it for one round trip and keeps no state in between.
//!
//! # Operations
//!
//! - [`get`] reads a window of an entity stream (`cart-123`) or a category
//!   (`cart`)
//! - [`get_last`] reads the last message of a stream
//! - [`put`] appends one message, optionally guarded by an expected version
//! - [`read`] pages through a stream with repeated `get` calls
//! - [`stream_version`] reports the position of the last message
//!
//! A failed expected version check surfaces as
//! [`MessageStoreError::VersionConflict`]; every other backend failure is
//! passed through as [`MessageStoreError::Backend`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod execute;
mod mapper;
mod queries;
mod store;

pub use execute::WRONG_EXPECTED_VERSION;
pub use store::{get, get_last, put, read, stream_version};

pub use messagestore_types::stream_name;
pub use messagestore_types::{
    BackendError, BatchSize, Cell, CodecError, Condition, ExpectedVersion, GetLastOptions,
    GetOptions, IdGenerator, MessageRecord, MessageStoreError, Param, PayloadField, Procedure,
    PutOptions, ReadMessage, ReadTransform, Row, Session, Statement, StreamName, WriteMessage,
};

#[cfg(feature = "postgres")]
pub use messagestore_postgres::{
    MaxConnections, PostgresConfig, PostgresSession, PostgresSessionError,
};

#[cfg(feature = "memory")]
pub use messagestore_memory::InMemorySession;
