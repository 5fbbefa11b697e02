//! Repository port traits
//!
//! These traits define the interface for data persistence.
//! Implementations are provided by adapters (e.g., PostgreSQL).

use async_trait::async_trait;

use crate::domain::entities::{Member, MemberFilter, MemberId, MemberPatch, NewMember};
use crate::domain::ledger::ToggleOutcome;
use crate::error::DomainError;

/// Repository for Member entities
///
/// Write paths own their invariants: inserts check capacity under a lock and
/// toggles lock the target plus every active row before planning.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Find a member by ID
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError>;

    /// Find a member by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<Member>, DomainError>;

    /// Return which of the given lowercase emails are already taken
    async fn find_existing_emails(&self, emails: &[String]) -> Result<Vec<String>, DomainError>;

    /// List members matching a filter, oldest first
    async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>, DomainError>;

    /// Count all members
    async fn count(&self) -> Result<u64, DomainError>;

    /// Create a member, enforcing the capacity limit
    async fn create(&self, member: &NewMember) -> Result<Member, DomainError>;

    /// Create several members in one transaction; nothing is written on failure
    async fn create_many(&self, members: &[NewMember]) -> Result<Vec<Member>, DomainError>;

    /// Update editable fields. The patch is already normalised.
    async fn update(&self, id: &MemberId, patch: &MemberPatch) -> Result<Member, DomainError>;

    /// Expire a member and charge the other active members
    ///
    /// The expiry time is read after the snapshot is locked, so every member
    /// charged has `created_at <= expired_at`.
    async fn expire(&self, id: &MemberId) -> Result<ToggleOutcome, DomainError>;

    /// Revert an expired member and refund the reconstructed charge set
    async fn revert(&self, id: &MemberId) -> Result<ToggleOutcome, DomainError>;
}
