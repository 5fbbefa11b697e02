//! Notification port
//!
//! Outbound events about ledger changes. Delivery is best-effort: the ledger
//! has already committed by the time a notifier sees an event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::MemberId;
use crate::domain::ledger::{LedgerAction, LedgerChange};
use crate::error::NotifyError;

/// Event emitted after a committed toggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    MemberExpired {
        target_id: MemberId,
        affected_ids: Vec<MemberId>,
        at: DateTime<Utc>,
    },
    MemberReverted {
        target_id: MemberId,
        affected_ids: Vec<MemberId>,
        at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    pub fn from_change(change: &LedgerChange) -> Self {
        let target_id = change.member.id;
        let affected_ids = change.affected_ids();
        match change.action {
            LedgerAction::Expire => LedgerEvent::MemberExpired {
                target_id,
                affected_ids,
                at: change.at,
            },
            LedgerAction::Revert => LedgerEvent::MemberReverted {
                target_id,
                affected_ids,
                at: change.at,
            },
        }
    }

    pub fn target_id(&self) -> MemberId {
        match self {
            LedgerEvent::MemberExpired { target_id, .. }
            | LedgerEvent::MemberReverted { target_id, .. } => *target_id,
        }
    }

    pub fn affected_ids(&self) -> &[MemberId] {
        match self {
            LedgerEvent::MemberExpired { affected_ids, .. }
            | LedgerEvent::MemberReverted { affected_ids, .. } => affected_ids,
        }
    }
}

/// Port trait for telling members about charges and refunds
#[async_trait]
pub trait MembershipNotifier: Send + Sync {
    /// `target_id` expired; each of `affected_ids` was charged
    async fn notify_expired(
        &self,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError>;

    /// `target_id` was reverted; each of `affected_ids` was refunded
    async fn notify_reverted(
        &self,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError>;
}
