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
    trivial_casts,
    trivial_numeric_casts,
    unreachable_code,
    unused_assignments,
    unused_attributes,
    unused_extern_crates,
    unused_imports,
    unused_must_use,
    unused_mut,
    unused_parens,
    unused_variables
)]

//! Test support for `MessageStore` sessions.
//!
//! - [`contract`]: the behavioral suite every session must pass, with the
//!   `message_store_contract_tests!` macro that expands it into tests
//! - [`chaos`]: a session wrapper that injects backend failures

pub mod chaos;
pub mod contract;

pub use chaos::*;
