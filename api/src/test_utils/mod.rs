//! Test utilities
//!
//! Manual mock implementations and test fixtures for unit testing.
//!
//! Why manual mocks instead of mockall?
//! - mockall has lifetime issues with traits containing `&str` parameters
//! - Manual mocks are more explicit and easier to debug
//! - We control exactly what they return without macro magic
//!
//! The in-memory member repository runs the same `domain::ledger` planning as
//! the Postgres adapter, so service tests exercise the real ledger rules.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
