//! Adapters layer
//!
//! Implementations of port traits for external systems.

pub mod notify;
pub mod postgres;

pub use notify::{LogNotifier, WebhookNotifier};
pub use postgres::PostgresMemberRepository;
