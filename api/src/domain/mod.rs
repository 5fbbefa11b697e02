//! Domain layer
//!
//! Contains pure business logic with no external dependencies.
//! - `entities`: Domain models representing core business concepts
//! - `ledger`: Expire/revert planning over a locked snapshot
//! - `ports`: Trait definitions for external dependencies

pub mod entities;
pub mod ledger;
pub mod ports;
