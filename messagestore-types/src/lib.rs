#![forbid(
    invalid_value,
    overflowing_literals,
    unconditional_recursion,
    unsafe_code
)]
#![deny(
    bad_style,
    deprecated,
    meta_variable_misuse,
    non_ascii_idents,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    trivial_numeric_casts,
    unreachable_code,
    unused_must_use,
    unused_mut,
    unused_parens
)]

//! Shared vocabulary types and traits for the MessageStore adapter.
//!
//! This crate provides the types shared between the core `messagestore` crate
//! and the session implementations (`messagestore-postgres`,
//! `messagestore-memory`). Keeping them here lets the core re-export adapters
//! behind feature flags without circular dependencies.
//!
//! # Overview
//!
//! - Stream naming: `StreamName` and the category/id segment helpers
//! - Messages: `WriteMessage`, `ReadMessage`, `MessageRecord`
//! - Operation options: `GetOptions`, `GetLastOptions`, `PutOptions`,
//!   `ExpectedVersion`, `Condition`, `BatchSize`, `IdGenerator`, `ReadTransform`
//! - Backend seam: the `Session` trait with `Statement`, `Procedure`, `Param`,
//!   `Row` and `Cell`
//! - Errors: `MessageStoreError`, `CodecError`, `BackendError`

mod errors;
mod message;
mod options;
mod session;
pub mod stream_name;

pub use errors::{BackendError, CodecError, MessageStoreError, PayloadField};
pub use message::{MessageRecord, ReadMessage, WriteMessage};
pub use options::{
    BatchSize, Condition, ExpectedVersion, GetLastOptions, GetOptions, IdGenerator, PutOptions,
    ReadTransform,
};
pub use session::{Cell, Param, Procedure, Row, Session, Statement};
pub use stream_name::StreamName;
