//! Ledger service
//!
//! Member management and the expire/revert toggle. Every committed toggle is
//! pushed to the notification sink after the repository transaction returns.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::app::notifications::LedgerEventSink;
use crate::domain::entities::{
    normalize_balance, normalize_email, normalize_name, Member, MemberFilter, MemberId,
    MemberPatch, NewMember,
};
use crate::domain::ledger::{LedgerAction, ToggleOutcome};
use crate::domain::ports::{LedgerEvent, MemberRepository};
use crate::error::{AppError, DomainError};

/// Per-id result of a bulk toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    Applied,
    Unchanged,
    NotFound,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkEntry {
    pub member_id: MemberId,
    pub status: BulkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub action: LedgerAction,
    pub applied: usize,
    pub results: Vec<BulkEntry>,
}

/// Service for member management and ledger toggles
pub struct LedgerService<MR>
where
    MR: MemberRepository,
{
    members: Arc<MR>,
    events: LedgerEventSink,
}

impl<MR> LedgerService<MR>
where
    MR: MemberRepository,
{
    pub fn new(members: Arc<MR>, events: LedgerEventSink) -> Self {
        Self { members, events }
    }

    /// Expire a member, charging every other active member
    ///
    /// Already-expired and unknown ids are no-ops and emit nothing.
    pub async fn mark_expired(&self, id: &MemberId) -> Result<ToggleOutcome, AppError> {
        self.toggle(id, LedgerAction::Expire).await
    }

    /// Revert an expired member, refunding the members charged at expiry
    pub async fn revert_expired(&self, id: &MemberId) -> Result<ToggleOutcome, AppError> {
        self.toggle(id, LedgerAction::Revert).await
    }

    pub async fn expire_many(&self, ids: &[MemberId]) -> BulkReport {
        self.toggle_many(ids, LedgerAction::Expire).await
    }

    pub async fn revert_many(&self, ids: &[MemberId]) -> BulkReport {
        self.toggle_many(ids, LedgerAction::Revert).await
    }

    async fn toggle(&self, id: &MemberId, action: LedgerAction) -> Result<ToggleOutcome, AppError> {
        let outcome = match action {
            LedgerAction::Expire => self.members.expire(id).await?,
            LedgerAction::Revert => self.members.revert(id).await?,
        };

        match &outcome {
            ToggleOutcome::Applied(change) => {
                self.events.emit(LedgerEvent::from_change(change));
            }
            ToggleOutcome::Unchanged(member) => {
                tracing::debug!(
                    member_id = %member.id,
                    %action,
                    status = %member.status(),
                    "Toggle skipped; member already in requested state"
                );
            }
            ToggleOutcome::NotFound => {
                tracing::debug!(member_id = %id, %action, "Toggle skipped; no such member");
            }
        }

        Ok(outcome)
    }

    /// Each id is its own transaction; one failure does not stop the batch
    async fn toggle_many(&self, ids: &[MemberId], action: LedgerAction) -> BulkReport {
        let mut results = Vec::with_capacity(ids.len());

        for id in ids {
            let entry = match self.toggle(id, action).await {
                Ok(ToggleOutcome::Applied(_)) => BulkEntry {
                    member_id: *id,
                    status: BulkStatus::Applied,
                    error: None,
                },
                Ok(ToggleOutcome::Unchanged(_)) => BulkEntry {
                    member_id: *id,
                    status: BulkStatus::Unchanged,
                    error: None,
                },
                Ok(ToggleOutcome::NotFound) => BulkEntry {
                    member_id: *id,
                    status: BulkStatus::NotFound,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(member_id = %id, %action, error = %e, "Bulk toggle entry failed");
                    BulkEntry {
                        member_id: *id,
                        status: BulkStatus::Failed,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(entry);
        }

        let applied = results
            .iter()
            .filter(|r| r.status == BulkStatus::Applied)
            .count();
        tracing::info!(%action, requested = ids.len(), applied, "Bulk toggle finished");

        BulkReport {
            action,
            applied,
            results,
        }
    }

    /// Create a single member
    pub async fn create_member(
        &self,
        name: &str,
        email: &str,
        balance: Decimal,
    ) -> Result<Member, AppError> {
        let name = normalize_name(name).map_err(validation)?;
        let email = normalize_email(email).map_err(validation)?;
        let balance = normalize_balance(balance).map_err(validation)?;

        if self.members.find_by_email(&email).await?.is_some() {
            return Err(AppError::Domain(DomainError::AlreadyExists(format!(
                "Member with email '{}' already exists",
                email
            ))));
        }

        let member = self
            .members
            .create(&NewMember {
                name,
                email,
                balance,
            })
            .await?;

        tracing::info!(member_id = %member.id, email = %member.email, "Member created");
        Ok(member)
    }

    /// Edit name, email or balance. Status only changes through the toggle.
    pub async fn update_member(
        &self,
        id: &MemberId,
        patch: MemberPatch,
    ) -> Result<Member, AppError> {
        if patch.is_empty() {
            return Err(AppError::BadRequest(
                "Provide at least one of name, email, balance".to_string(),
            ));
        }

        let patch = MemberPatch {
            name: patch.name.as_deref().map(normalize_name).transpose().map_err(validation)?,
            email: patch.email.as_deref().map(normalize_email).transpose().map_err(validation)?,
            balance: patch.balance.map(normalize_balance).transpose().map_err(validation)?,
        };

        let member = self.members.update(id, &patch).await?;
        tracing::info!(member_id = %member.id, "Member updated");
        Ok(member)
    }

    pub async fn get_member(&self, id: &MemberId) -> Result<Option<Member>, AppError> {
        Ok(self.members.find_by_id(id).await?)
    }

    /// Roster ordered by join time
    pub async fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, AppError> {
        Ok(self.members.list(filter).await?)
    }
}

fn validation(msg: String) -> AppError {
    AppError::Domain(DomainError::Validation(msg))
}
