//! Message store contract suite entry point for reusable session verification.
//!
//! Any `Session` implementation plugs into the shared behavioral suite by
//! invoking `message_store_contract_tests!` with a session factory. New
//! scenarios added to the suite are picked up by every invocation.

use messagestore_testing::contract::message_store_contract_tests;

message_store_contract_tests! {
    suite = in_memory,
    make_session = messagestore_memory::InMemorySession::new,
}

message_store_contract_tests! {
    suite = in_memory_behind_zero_chaos,
    make_session = || {
        use messagestore_testing::chaos::{ChaosConfig, ChaosSessionExt};
        messagestore_memory::InMemorySession::new().with_chaos(ChaosConfig::deterministic())
    },
}
