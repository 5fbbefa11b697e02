//! Downloadable error reports for rejected imports
//!
//! Reports live in process memory keyed by a random id and expire after a
//! configurable TTL. Expired entries are pruned whenever the store is touched.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Header of the downloadable report
pub const REPORT_HEADER: [&str; 5] = ["row_number", "name", "email", "balance", "error"];

/// One rejected upload row, echoing the raw input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row_number: usize,
    pub name: String,
    pub email: String,
    pub balance: String,
    pub error: String,
}

/// Render rejected rows as CSV
pub fn render_error_report(errors: &[RowError]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(REPORT_HEADER)
        .map_err(|e| AppError::Internal(format!("Failed to write report header: {}", e)))?;

    for row in errors {
        writer
            .write_record([
                row.row_number.to_string().as_str(),
                row.name.as_str(),
                row.email.as_str(),
                row.balance.as_str(),
                row.error.as_str(),
            ])
            .map_err(|e| AppError::Internal(format!("Failed to write report row: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush report: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("Report is not UTF-8: {}", e)))
}

struct StoredReport {
    csv: String,
    created_at: DateTime<Utc>,
}

/// In-process store of rendered reports
pub struct ImportReportStore {
    reports: RwLock<HashMap<Uuid, StoredReport>>,
    ttl: Duration,
}

impl ImportReportStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            reports: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Store a rendered report and return its id
    pub fn insert(&self, csv: String) -> Uuid {
        self.insert_at(csv, Utc::now())
    }

    fn insert_at(&self, csv: String, now: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        let mut reports = self.reports.write().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut reports, now);
        reports.insert(
            id,
            StoredReport {
                csv,
                created_at: now,
            },
        );
        id
    }

    /// Fetch a report if it exists and has not expired
    pub fn get(&self, id: &Uuid) -> Option<String> {
        self.get_at(id, Utc::now())
    }

    fn get_at(&self, id: &Uuid, now: DateTime<Utc>) -> Option<String> {
        let mut reports = self.reports.write().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut reports, now);
        reports.get(id).map(|r| r.csv.clone())
    }

    fn prune(&self, reports: &mut HashMap<Uuid, StoredReport>, now: DateTime<Utc>) {
        let before = reports.len();
        reports.retain(|_, r| now - r.created_at < self.ttl);
        let pruned = before - reports.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired import reports");
        }
    }
}
