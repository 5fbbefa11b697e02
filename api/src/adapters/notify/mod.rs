//! Notification adapters
//!
//! `LogNotifier` writes events to the log and is the default.
//! `WebhookNotifier` posts events to an external endpoint when one is configured.

pub mod log_notifier;
pub mod webhook;

pub use log_notifier::LogNotifier;
pub use webhook::WebhookNotifier;
