//! Application layer
//!
//! Contains use cases and service orchestration.
//! Services coordinate between domain entities, ports, and external systems.

pub mod import_reports;
pub mod import_service;
pub mod ledger_service;
pub mod notifications;

pub use import_reports::ImportReportStore;
pub use import_service::{ImportOutcome, ImportRejection, ImportService};
pub use ledger_service::{BulkReport, BulkStatus, LedgerService};
pub use notifications::{spawn_dispatcher, LedgerEventSink};
