//! Bulk member import
//!
//! Uploads are all-or-nothing: the batch is checked against capacity, every
//! row is validated, and only a fully clean batch is inserted (in a single
//! transaction). Rejected rows are itemised and stored as a downloadable CSV.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::app::import_reports::{render_error_report, ImportReportStore, RowError};
use crate::domain::entities::{ensure_capacity, Member, NewMember, MAX_MEMBERS};
use crate::domain::ports::MemberRepository;
use crate::error::{AppError, DomainError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Raw upload row; `row_number` is the 1-based data row position
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub row_number: usize,
    pub name: String,
    pub email: String,
    pub balance: String,
}

/// Why a batch was refused
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ImportRejection {
    /// The batch would push the pool past capacity; rows were not validated
    CapacityExceeded {
        existing: u64,
        incoming: usize,
        overflow: u64,
        message: String,
    },
    /// At least one row is invalid; `report_id` points at the CSV artifact
    InvalidRows {
        errors: Vec<RowError>,
        report_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub enum ImportOutcome {
    Imported(Vec<Member>),
    Rejected(ImportRejection),
}

/// Parse an uploaded CSV into candidate rows
///
/// Expects a header row with `name`, `email` and `balance` (or
/// `wallet_balance`) in any order. Fields are trimmed and short rows are
/// padded with empty values.
pub fn parse_members_csv(data: &[u8]) -> Result<Vec<CandidateRow>, AppError> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::BadRequest("CSV file is empty".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::BadRequest(format!("Failed to read CSV header: {}", e)))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));

    let (Some(name_idx), Some(email_idx), Some(balance_idx)) = (
        column(&["name"]),
        column(&["email"]),
        column(&["balance", "wallet_balance"]),
    ) else {
        return Err(AppError::BadRequest(
            "CSV must contain columns: name, email, balance".to_string(),
        ));
    };

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let row_number = idx + 1;
        let record = record.map_err(|e| {
            AppError::BadRequest(format!("Failed to read CSV row {}: {}", row_number, e))
        })?;
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();

        rows.push(CandidateRow {
            row_number,
            name: field(name_idx),
            email: field(email_idx),
            balance: field(balance_idx),
        });
    }

    Ok(rows)
}

/// Reject a batch that would overflow the pool
pub fn check_batch_capacity(existing: u64, incoming: usize) -> Result<(), ImportRejection> {
    match ensure_capacity(existing, incoming as u64) {
        Ok(()) => Ok(()),
        Err(e) => Err(ImportRejection::CapacityExceeded {
            existing,
            incoming,
            overflow: existing + incoming as u64 - MAX_MEMBERS,
            message: match e {
                DomainError::Validation(msg) => msg,
                other => other.to_string(),
            },
        }),
    }
}

/// Validate every row, collecting all problems
///
/// `taken` holds lowercased emails already in the store. Within the batch the
/// first occurrence of an email wins and later ones are rejected.
pub fn validate_rows(
    rows: &[CandidateRow],
    taken: &HashSet<String>,
) -> Result<Vec<NewMember>, Vec<RowError>> {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut valid = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for row in rows {
        let parsed = NewMember::parse(&row.name, &row.email, &row.balance);
        let mut problems = match &parsed {
            Ok(_) => Vec::new(),
            Err(field_errors) => field_errors.clone(),
        };

        let email = row.email.trim().to_lowercase();
        if !email.is_empty() {
            match first_seen.get(&email) {
                Some(first) => problems.push(format!(
                    "Duplicate email '{}' in upload (first seen in row {}).",
                    email, first
                )),
                None => {
                    first_seen.insert(email.clone(), row.row_number);
                }
            }
            if taken.contains(&email) {
                problems.push(format!("Member with email '{}' already exists.", email));
            }
        }

        match parsed {
            Ok(member) if problems.is_empty() => valid.push(member),
            _ => errors.push(RowError {
                row_number: row.row_number,
                name: row.name.clone(),
                email: row.email.clone(),
                balance: row.balance.clone(),
                error: problems.join(" "),
            }),
        }
    }

    if errors.is_empty() {
        Ok(valid)
    } else {
        Err(errors)
    }
}

/// Service for all-or-nothing CSV imports
pub struct ImportService<MR>
where
    MR: MemberRepository,
{
    members: Arc<MR>,
    reports: ImportReportStore,
}

impl<MR> ImportService<MR>
where
    MR: MemberRepository,
{
    pub fn new(members: Arc<MR>, reports: ImportReportStore) -> Self {
        Self { members, reports }
    }

    /// Parse and import an uploaded file
    pub async fn import_upload(&self, data: &[u8]) -> Result<ImportOutcome, AppError> {
        let rows = parse_members_csv(data)?;
        self.import(rows).await
    }

    /// Import rows against the current member count
    pub async fn import(&self, rows: Vec<CandidateRow>) -> Result<ImportOutcome, AppError> {
        let existing = self.members.count().await?;
        self.import_rows(rows, existing).await
    }

    /// Import rows given a member count read by the caller
    ///
    /// The insert transaction re-checks capacity under a table lock, so a
    /// stale `existing_count` can only cause a rejection, never an overflow.
    pub async fn import_rows(
        &self,
        rows: Vec<CandidateRow>,
        existing_count: u64,
    ) -> Result<ImportOutcome, AppError> {
        if rows.is_empty() {
            return Err(AppError::BadRequest("CSV contains no data rows".to_string()));
        }

        if let Err(rejection) = check_batch_capacity(existing_count, rows.len()) {
            tracing::info!(
                existing = existing_count,
                incoming = rows.len(),
                "Import rejected: capacity exceeded"
            );
            return Ok(ImportOutcome::Rejected(rejection));
        }

        let emails: Vec<String> = rows
            .iter()
            .map(|r| r.email.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let taken: HashSet<String> = self
            .members
            .find_existing_emails(&emails)
            .await?
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect();

        match validate_rows(&rows, &taken) {
            Ok(new_members) => {
                let created = self.members.create_many(&new_members).await?;
                tracing::info!(count = created.len(), "Import committed");
                Ok(ImportOutcome::Imported(created))
            }
            Err(errors) => {
                let report_id = self.reports.insert(render_error_report(&errors)?);
                tracing::info!(
                    rows = rows.len(),
                    invalid = errors.len(),
                    %report_id,
                    "Import rejected: invalid rows"
                );
                Ok(ImportOutcome::Rejected(ImportRejection::InvalidRows {
                    errors,
                    report_id,
                }))
            }
        }
    }

    /// Rendered CSV for a rejected import, while it has not expired
    pub fn error_report(&self, id: &Uuid) -> Option<String> {
        self.reports.get(id)
    }
}
