//! Mock implementations of port traits
//!
//! These are in-memory implementations that can be configured for testing.
//! They store data in memory and allow tests to verify behavior.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::domain::entities::{
    ensure_capacity, Member, MemberFilter, MemberId, MemberPatch, NewMember,
};
use crate::domain::ledger::{
    plan_expiry, plan_revert, toggle_time, LedgerAction, ToggleOutcome,
};
use crate::domain::ports::{MemberRepository, MembershipNotifier};
use crate::error::{DomainError, NotifyError};

// ============================================================================
// In-Memory Member Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryMemberRepository {
    members: Arc<RwLock<HashMap<MemberId, Member>>>,
    pub should_fail: Arc<RwLock<bool>>,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a database error
    pub fn failing() -> Self {
        Self {
            members: Arc::new(RwLock::new(HashMap::new())),
            should_fail: Arc::new(RwLock::new(true)),
        }
    }

    /// Pre-populate with a member for testing
    pub fn with_member(self, member: Member) -> Self {
        self.members.write().unwrap().insert(member.id, member);
        self
    }

    /// Current state of a member, bypassing the trait
    pub fn get(&self, id: &MemberId) -> Option<Member> {
        self.members.read().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.members.read().unwrap().len()
    }

    fn check(&self) -> Result<(), DomainError> {
        if *self.should_fail.read().unwrap() {
            return Err(DomainError::Database("Mock failure".to_string()));
        }
        Ok(())
    }

    /// Same planning as the Postgres adapter; the write lock stands in for
    /// row locks and is held from snapshot to write.
    fn toggle(&self, id: &MemberId, action: LedgerAction) -> Result<ToggleOutcome, DomainError> {
        self.check()?;
        let mut members = self.members.write().unwrap();

        let Some(target) = members.get(id).cloned() else {
            return Ok(ToggleOutcome::NotFound);
        };

        let mut rows: Vec<Member> = members
            .values()
            .filter(|m| m.active || m.id == *id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.id);
        let now = toggle_time(&rows, Utc::now());

        let plan = match action {
            LedgerAction::Expire => plan_expiry(&target, &rows, now)?,
            LedgerAction::Revert => plan_revert(&target, &rows, now)?,
        };
        let Some(plan) = plan else {
            return Ok(ToggleOutcome::Unchanged(target));
        };

        plan.apply_to(&mut rows);
        for row in &rows {
            members.insert(row.id, row.clone());
        }

        plan.into_change(&rows).map(ToggleOutcome::Applied)
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError> {
        self.check()?;
        Ok(self.members.read().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Member>, DomainError> {
        self.check()?;
        let email = email.trim().to_lowercase();
        Ok(self
            .members
            .read()
            .unwrap()
            .values()
            .find(|m| m.email == email)
            .cloned())
    }

    async fn find_existing_emails(&self, emails: &[String]) -> Result<Vec<String>, DomainError> {
        self.check()?;
        let members = self.members.read().unwrap();
        Ok(members
            .values()
            .filter(|m| emails.iter().any(|e| e.to_lowercase() == m.email))
            .map(|m| m.email.clone())
            .collect())
    }

    async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>, DomainError> {
        self.check()?;
        let mut result: Vec<Member> = self
            .members
            .read()
            .unwrap()
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(result)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        self.check()?;
        Ok(self.members.read().unwrap().len() as u64)
    }

    async fn create(&self, member: &NewMember) -> Result<Member, DomainError> {
        let created = self.create_many(std::slice::from_ref(member)).await?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::Internal("Insert returned no row".to_string()))
    }

    async fn create_many(&self, new_members: &[NewMember]) -> Result<Vec<Member>, DomainError> {
        self.check()?;
        let mut members = self.members.write().unwrap();
        ensure_capacity(members.len() as u64, new_members.len() as u64)?;

        for (i, new) in new_members.iter().enumerate() {
            let clash = members.values().any(|m| m.email == new.email)
                || new_members[..i].iter().any(|n| n.email == new.email);
            if clash {
                return Err(DomainError::AlreadyExists(format!(
                    "Email already registered: {}",
                    new.email
                )));
            }
        }

        let now = Utc::now();
        let created: Vec<Member> = new_members
            .iter()
            .map(|new| Member {
                id: MemberId::new(),
                name: new.name.clone(),
                email: new.email.clone(),
                balance: new.balance,
                active: true,
                expired_at: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        for member in &created {
            members.insert(member.id, member.clone());
        }
        Ok(created)
    }

    async fn update(&self, id: &MemberId, patch: &MemberPatch) -> Result<Member, DomainError> {
        self.check()?;
        let mut members = self.members.write().unwrap();

        if let Some(email) = &patch.email {
            if members.values().any(|m| m.id != *id && m.email == *email) {
                return Err(DomainError::AlreadyExists(format!(
                    "Member with email '{}' already exists",
                    email
                )));
            }
        }

        let member = members
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("Member {} not found", id)))?;
        if let Some(name) = &patch.name {
            member.name = name.clone();
        }
        if let Some(email) = &patch.email {
            member.email = email.clone();
        }
        if let Some(balance) = patch.balance {
            member.balance = balance;
        }
        member.updated_at = Utc::now();
        Ok(member.clone())
    }

    async fn expire(&self, id: &MemberId) -> Result<ToggleOutcome, DomainError> {
        self.toggle(id, LedgerAction::Expire)
    }

    async fn revert(&self, id: &MemberId) -> Result<ToggleOutcome, DomainError> {
        self.toggle(id, LedgerAction::Revert)
    }
}

// ============================================================================
// Recording Notifier
// ============================================================================

/// (kind, target, affected) for each delivery attempt
pub type NotifierCall = (&'static str, MemberId, Vec<MemberId>);

/// A notifier that records every call and optionally fails them
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    should_fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            should_fail: true,
        }
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(
        &self,
        kind: &'static str,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((kind, *target_id, affected_ids.to_vec()));
        if self.should_fail {
            return Err(NotifyError::Rejected {
                status: 503,
                message: "Mock failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipNotifier for RecordingNotifier {
    async fn notify_expired(
        &self,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError> {
        self.record("expired", target_id, affected_ids)
    }

    async fn notify_reverted(
        &self,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError> {
        self.record("reverted", target_id, affected_ids)
    }
}
