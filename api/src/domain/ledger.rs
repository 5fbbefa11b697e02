//! Membership ledger rules
//!
//! Expiring a member charges every other active member [`EXPIRY_CHARGE`];
//! reverting refunds the same amount. Planning is pure: repositories hand in
//! the rows they locked, get back a [`LedgerPlan`], write it inside the same
//! transaction and report a [`ToggleOutcome`].
//!
//! No per-expiry record of who was charged is kept. The refund set on revert
//! is rebuilt as "active now and created before the target expired", which can
//! miss or over-refund when membership churns between the two events.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{Member, MemberId};
use crate::error::DomainError;

/// Amount moved per affected member on expire/revert
pub const EXPIRY_CHARGE: Decimal = Decimal::ONE;

/// Direction of a status toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    Expire,
    Revert,
}

impl std::fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerAction::Expire => write!(f, "expire"),
            LedgerAction::Revert => write!(f, "revert"),
        }
    }
}

/// A member whose balance blocks an expiry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shortfall {
    pub member_id: MemberId,
    pub name: String,
    pub balance: Decimal,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) has {}", self.name, self.member_id, self.balance)
    }
}

/// One member's balance change within a plan
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceAdjustment {
    pub member_id: MemberId,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
}

/// Everything a toggle writes, computed from a locked snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPlan {
    pub action: LedgerAction,
    pub target: MemberId,
    pub at: DateTime<Utc>,
    pub adjustments: Vec<BalanceAdjustment>,
}

impl LedgerPlan {
    /// Status the target ends up with
    pub fn target_active(&self) -> bool {
        self.action == LedgerAction::Revert
    }

    /// `expired_at` the target ends up with
    pub fn target_expired_at(&self) -> Option<DateTime<Utc>> {
        match self.action {
            LedgerAction::Expire => Some(self.at),
            LedgerAction::Revert => None,
        }
    }

    pub fn affected_ids(&self) -> Vec<MemberId> {
        self.adjustments.iter().map(|a| a.member_id).collect()
    }

    /// Apply the plan to in-memory rows (the snapshot it was planned from)
    pub fn apply_to(&self, rows: &mut [Member]) {
        for row in rows.iter_mut() {
            if row.id == self.target {
                row.active = self.target_active();
                row.expired_at = self.target_expired_at();
                row.updated_at = self.at;
            } else if let Some(adj) = self.adjustments.iter().find(|a| a.member_id == row.id) {
                row.balance = adj.new_balance;
                row.updated_at = self.at;
            }
        }
    }

    /// Build the outcome from rows the plan has been applied to
    pub fn into_change(self, rows: &[Member]) -> Result<LedgerChange, DomainError> {
        let member = rows
            .iter()
            .find(|m| m.id == self.target)
            .cloned()
            .ok_or_else(|| {
                DomainError::Internal(format!("Target {} missing from snapshot", self.target))
            })?;

        let affected = self
            .adjustments
            .iter()
            .filter_map(|adj| rows.iter().find(|m| m.id == adj.member_id).cloned())
            .collect();

        Ok(LedgerChange {
            action: self.action,
            member,
            affected,
            amount: EXPIRY_CHARGE,
            at: self.at,
        })
    }
}

/// A committed toggle
#[derive(Debug, Clone, Serialize)]
pub struct LedgerChange {
    pub action: LedgerAction,
    /// Target after the change
    pub member: Member,
    /// Members charged (expire) or refunded (revert), after the change
    pub affected: Vec<Member>,
    /// Amount moved per affected member
    pub amount: Decimal,
    pub at: DateTime<Utc>,
}

impl LedgerChange {
    pub fn affected_ids(&self) -> Vec<MemberId> {
        self.affected.iter().map(|m| m.id).collect()
    }
}

/// Result of an expire or revert request
#[derive(Debug, Clone)]
pub enum ToggleOutcome {
    Applied(LedgerChange),
    /// Target was already in the requested state; nothing written
    Unchanged(Member),
    /// No member with that id; nothing written
    NotFound,
}

impl ToggleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ToggleOutcome::Applied(_))
    }
}

/// Timestamp for a toggle over a locked `snapshot`
///
/// Truncated to the microseconds Postgres stores and kept strictly after every
/// `created_at` in the snapshot, so the refund filter on revert covers exactly
/// the members an expiry charged.
pub fn toggle_time(snapshot: &[Member], clock: DateTime<Utc>) -> DateTime<Utc> {
    let now = clock.trunc_subsecs(6);
    match snapshot.iter().map(|m| m.created_at).max() {
        Some(latest) if latest >= now => latest.trunc_subsecs(6) + Duration::microseconds(1),
        _ => now,
    }
}

/// Plan an expiry of `target` against the locked `snapshot`
///
/// Returns `Ok(None)` when the target is already expired. Fails with
/// `InsufficientFunds` when any other active member cannot cover the charge.
pub fn plan_expiry(
    target: &Member,
    snapshot: &[Member],
    now: DateTime<Utc>,
) -> Result<Option<LedgerPlan>, DomainError> {
    if !target.active {
        return Ok(None);
    }

    let charged: Vec<&Member> = snapshot
        .iter()
        .filter(|m| m.active && m.id != target.id)
        .collect();

    let shortfalls: Vec<Shortfall> = charged
        .iter()
        .filter(|m| m.balance < EXPIRY_CHARGE)
        .map(|m| Shortfall {
            member_id: m.id,
            name: m.name.clone(),
            balance: m.balance,
        })
        .collect();

    if !shortfalls.is_empty() {
        return Err(DomainError::InsufficientFunds(shortfalls));
    }

    Ok(Some(LedgerPlan {
        action: LedgerAction::Expire,
        target: target.id,
        at: now,
        adjustments: charged
            .into_iter()
            .map(|m| BalanceAdjustment {
                member_id: m.id,
                old_balance: m.balance,
                new_balance: m.balance - EXPIRY_CHARGE,
            })
            .collect(),
    }))
}

/// Plan a revert of `target` against the locked `snapshot`
///
/// Returns `Ok(None)` when the target is already active.
pub fn plan_revert(
    target: &Member,
    snapshot: &[Member],
    now: DateTime<Utc>,
) -> Result<Option<LedgerPlan>, DomainError> {
    if target.active {
        return Ok(None);
    }

    let expired_at = target.expired_at.ok_or_else(|| {
        DomainError::Internal(format!("Expired member {} has no expiry time", target.id))
    })?;

    let refunded = snapshot
        .iter()
        .filter(|m| m.active && m.id != target.id && m.created_at < expired_at);

    Ok(Some(LedgerPlan {
        action: LedgerAction::Revert,
        target: target.id,
        at: now,
        adjustments: refunded
            .map(|m| BalanceAdjustment {
                member_id: m.id,
                old_balance: m.balance,
                new_balance: m.balance + EXPIRY_CHARGE,
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{dec, test_member_created_at, test_member_with_balance};

    #[test]
    fn expiry_charges_every_other_active_member() {
        let target = test_member_with_balance("target", "10");
        let a = test_member_with_balance("a", "5");
        let b = test_member_with_balance("b", "1");
        let snapshot = vec![target.clone(), a.clone(), b.clone()];

        let plan = plan_expiry(&target, &snapshot, Utc::now()).unwrap().unwrap();

        assert_eq!(plan.action, LedgerAction::Expire);
        assert_eq!(plan.adjustments.len(), 2);
        let for_b = plan.adjustments.iter().find(|x| x.member_id == b.id).unwrap();
        assert_eq!(for_b.new_balance, Decimal::ZERO);
        assert!(!plan.affected_ids().contains(&target.id));
    }

    #[test]
    fn expiry_skips_inactive_members() {
        let target = test_member_with_balance("target", "10");
        let mut gone = test_member_with_balance("gone", "0");
        gone.active = false;
        gone.expired_at = Some(Utc::now());

        let plan = plan_expiry(&target, &[target.clone(), gone.clone()], Utc::now())
            .unwrap()
            .unwrap();

        assert!(plan.adjustments.is_empty());
    }

    #[test]
    fn expiry_of_expired_member_is_noop() {
        let mut target = test_member_with_balance("target", "10");
        target.active = false;
        target.expired_at = Some(Utc::now());

        assert!(plan_expiry(&target, &[target.clone()], Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn expiry_blocked_by_low_balance_names_offenders() {
        let target = test_member_with_balance("target", "10");
        let poor = test_member_with_balance("poor", "0.99");
        let rich = test_member_with_balance("rich", "50");

        let err = plan_expiry(&target, &[target.clone(), poor.clone(), rich], Utc::now())
            .unwrap_err();

        match err {
            DomainError::InsufficientFunds(shortfalls) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].member_id, poor.id);
                assert_eq!(shortfalls[0].balance, dec("0.99"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn target_balance_does_not_block_its_own_expiry() {
        let target = test_member_with_balance("target", "0");
        let other = test_member_with_balance("other", "3");

        assert!(plan_expiry(&target, &[target.clone(), other], Utc::now()).is_ok());
    }

    #[test]
    fn revert_refunds_members_created_before_expiry() {
        let expired_at = Utc::now();
        let mut target = test_member_created_at("target", expired_at - Duration::days(3));
        target.active = false;
        target.expired_at = Some(expired_at);
        let old = test_member_created_at("old", expired_at - Duration::days(2));
        let newcomer = test_member_created_at("new", expired_at + Duration::hours(1));

        let plan = plan_revert(
            &target,
            &[target.clone(), old.clone(), newcomer.clone()],
            Utc::now(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(plan.affected_ids(), vec![old.id]);
        assert!(plan.target_active());
        assert_eq!(plan.target_expired_at(), None);
    }

    #[test]
    fn revert_of_active_member_is_noop() {
        let target = test_member_with_balance("target", "1");
        assert!(plan_revert(&target, &[target.clone()], Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn apply_then_change_reflects_new_state() {
        let target = test_member_with_balance("target", "4");
        let other = test_member_with_balance("other", "2");
        let mut rows = vec![target.clone(), other.clone()];
        let now = Utc::now();

        let plan = plan_expiry(&target, &rows, now).unwrap().unwrap();
        plan.apply_to(&mut rows);
        let change = plan.into_change(&rows).unwrap();

        assert!(!change.member.active);
        assert_eq!(change.member.expired_at, Some(now));
        assert_eq!(change.member.balance, dec("4"));
        assert_eq!(change.affected.len(), 1);
        assert_eq!(change.affected[0].balance, dec("1"));
        assert_eq!(change.amount, EXPIRY_CHARGE);
    }

    #[test]
    fn expire_then_revert_is_symmetric() {
        let created = Utc::now() - Duration::days(1);
        let target = test_member_created_at("target", created);
        let a = test_member_created_at("a", created);
        let b = test_member_created_at("b", created);
        let mut rows = vec![target.clone(), a, b];
        let before: Vec<Decimal> = rows.iter().map(|m| m.balance).collect();

        let expire = plan_expiry(&rows[0].clone(), &rows, Utc::now())
            .unwrap()
            .unwrap();
        expire.apply_to(&mut rows);

        let revert = plan_revert(&rows[0].clone(), &rows, Utc::now())
            .unwrap()
            .unwrap();
        revert.apply_to(&mut rows);

        let after: Vec<Decimal> = rows.iter().map(|m| m.balance).collect();
        assert_eq!(before, after);
        assert!(rows[0].active);
        assert!(rows[0].expired_at.is_none());
    }

    #[test]
    fn toggle_time_follows_clock_when_snapshot_is_older() {
        let clock = Utc::now();
        let rows = vec![test_member_created_at("old", clock - Duration::days(1))];
        assert_eq!(toggle_time(&rows, clock), clock.trunc_subsecs(6));
    }

    #[test]
    fn toggle_time_stays_after_latest_member() {
        let clock = Utc::now();
        // Clock skew: a snapshot row claims to be newer than the clock read
        let newcomer = test_member_created_at("new", clock + Duration::milliseconds(5));
        let at = toggle_time(&[newcomer.clone()], clock);
        assert!(newcomer.created_at < at);

        // Same microsecond as the clock read
        let same = test_member_created_at("same", clock.trunc_subsecs(6));
        assert!(same.created_at < toggle_time(&[same.clone()], clock));
    }

    #[test]
    fn member_created_at_expiry_instant_is_refunded() {
        let clock = Utc::now();
        let target = test_member_created_at("target", clock - Duration::days(1));
        let newcomer = test_member_created_at("new", clock.trunc_subsecs(6));
        let mut rows = vec![target.clone(), newcomer.clone()];

        let at = toggle_time(&rows, clock);
        let expire = plan_expiry(&target, &rows, at).unwrap().unwrap();
        assert_eq!(expire.affected_ids(), vec![newcomer.id]);
        expire.apply_to(&mut rows);

        let revert = plan_revert(&rows[0].clone(), &rows, at + Duration::seconds(1))
            .unwrap()
            .unwrap();
        assert_eq!(revert.affected_ids(), vec![newcomer.id]);
        revert.apply_to(&mut rows);
        assert_eq!(rows[1].balance, newcomer.balance);
    }

    #[test]
    fn shortfall_display_names_member() {
        let s = Shortfall {
            member_id: MemberId(uuid::Uuid::nil()),
            name: "Asha".to_string(),
            balance: dec("0.50"),
        };
        assert_eq!(
            s.to_string(),
            "Asha (00000000-0000-0000-0000-000000000000) has 0.50"
        );
    }
}
