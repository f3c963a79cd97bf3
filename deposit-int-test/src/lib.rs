//! Shared helpers for the Deposit integration tests.

pub mod test_util;
