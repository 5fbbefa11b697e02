//! Roster renderer
//!
//! Renders members, toggles and import results to markdown.

use crate::app::{BulkReport, BulkStatus, ImportOutcome, ImportRejection};
use crate::domain::entities::{Member, MemberId, MAX_MEMBERS};
use crate::domain::ledger::{LedgerAction, ToggleOutcome};

/// Render the member list as a markdown table
pub fn render_roster(members: &[Member]) -> String {
    let mut buf = String::new();

    buf.push_str("# Member Pool\n\n");

    let active = members.iter().filter(|m| m.active).count();
    buf.push_str(&format!(
        "{} listed ({} active, {} expired). Capacity: {}\n\n",
        members.len(),
        active,
        members.len() - active,
        MAX_MEMBERS
    ));

    if members.is_empty() {
        buf.push_str("_No members found._\n");
        return buf;
    }

    buf.push_str("| Name | Email | Balance | Status | ID |\n");
    buf.push_str("|---|---|---|---|---|\n");
    for m in members {
        buf.push_str(&format!(
            "| {} | {} | {:.2} | {} | {} |\n",
            truncate(&m.name, 40),
            m.email,
            m.balance,
            m.status(),
            m.id
        ));
    }

    buf
}

/// Render a single member
pub fn render_member(member: &Member) -> String {
    let mut buf = String::new();

    buf.push_str(&format!("# {}\n\n", member.name));
    buf.push_str(&format!("- **ID:** {}\n", member.id));
    buf.push_str(&format!("- **Email:** {}\n", member.email));
    buf.push_str(&format!("- **Balance:** {:.2}\n", member.balance));
    buf.push_str(&format!("- **Status:** {}\n", member.status()));
    if let Some(at) = member.expired_at {
        buf.push_str(&format!("- **Expired at:** {}\n", at.to_rfc3339()));
    }
    buf.push_str(&format!("- **Joined:** {}\n", member.created_at.to_rfc3339()));

    buf
}

/// Render the result of an expire or revert
pub fn render_toggle(action: LedgerAction, id: &MemberId, outcome: &ToggleOutcome) -> String {
    match outcome {
        ToggleOutcome::Applied(change) => {
            let (verb, effect) = match action {
                LedgerAction::Expire => ("Expired", "charged"),
                LedgerAction::Revert => ("Reverted", "refunded"),
            };
            let mut buf = format!("{} {} ({}).\n", verb, change.member.name, change.member.id);
            if change.affected.is_empty() {
                buf.push_str("No other members were affected.\n");
            } else {
                buf.push_str(&format!(
                    "{} member(s) {} {:.2}:\n",
                    change.affected.len(),
                    effect,
                    change.amount
                ));
                for m in &change.affected {
                    buf.push_str(&format!("- {}: now {:.2}\n", m.name, m.balance));
                }
            }
            buf
        }
        ToggleOutcome::Unchanged(member) => format!(
            "{} is already {}; nothing changed.\n",
            member.name,
            member.status()
        ),
        ToggleOutcome::NotFound => format!("No member with id {}.\n", id),
    }
}

/// Render a bulk toggle report
pub fn render_bulk(report: &BulkReport) -> String {
    let mut buf = format!(
        "{} applied to {} of {} member(s).\n\n",
        report.action,
        report.applied,
        report.results.len()
    );

    for entry in &report.results {
        let status = match entry.status {
            BulkStatus::Applied => "[OK]",
            BulkStatus::Unchanged => "[--]",
            BulkStatus::NotFound => "[??]",
            BulkStatus::Failed => "[!!]",
        };
        buf.push_str(&format!("{} {}", status, entry.member_id));
        if let Some(err) = &entry.error {
            buf.push_str(&format!(": {}", err));
        }
        buf.push('\n');
    }

    buf
}

/// Render an import outcome
pub fn render_import(outcome: &ImportOutcome) -> String {
    match outcome {
        ImportOutcome::Imported(created) => {
            let mut buf = format!("Imported {} member(s).\n\n", created.len());
            for m in created {
                buf.push_str(&format!("- {} <{}> {:.2}\n", m.name, m.email, m.balance));
            }
            buf
        }
        ImportOutcome::Rejected(ImportRejection::CapacityExceeded { message, .. }) => {
            format!("Import rejected. {}\nNo members were added.\n", message)
        }
        ImportOutcome::Rejected(ImportRejection::InvalidRows { errors, report_id }) => {
            let mut buf = format!(
                "Import rejected: {} row(s) have errors. No members were added.\n\n",
                errors.len()
            );
            for e in errors {
                buf.push_str(&format!("- Row {}: {}\n", e.row_number, e.error));
            }
            buf.push_str(&format!(
                "\nError report: /members/import/reports/{}\n",
                report_id
            ));
            buf
        }
    }
}

/// Truncate a string with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
