//! Member domain entity
//!
//! A member of the shared wallet pool. Membership is capped at
//! [`MAX_MEMBERS`]; expiring a member charges every other active member and
//! reverting refunds them (see `domain::ledger`).

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Hard ceiling on the number of members in the pool
pub const MAX_MEMBERS: u64 = 10;

/// Longest accepted display name
pub const MAX_NAME_LEN: usize = 100;

/// Balances are NUMERIC(10, 2): at most 8 integer digits
const MAX_BALANCE_EXCLUSIVE: i64 = 100_000_000;

/// Unique identifier for a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MemberId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Expired,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberStatus::Active => write!(f, "active"),
            MemberStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" | "alive" => Ok(MemberStatus::Active),
            "expired" => Ok(MemberStatus::Expired),
            _ => Err(format!("Unknown member status: {}", s)),
        }
    }
}

/// A member of the pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub balance: Decimal,
    pub active: bool,
    /// Set while the member is expired, cleared on revert
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn status(&self) -> MemberStatus {
        if self.active {
            MemberStatus::Active
        } else {
            MemberStatus::Expired
        }
    }
}

/// Data needed to create a member. Fields are already normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub balance: Decimal,
}

impl NewMember {
    /// Normalise and validate raw input
    ///
    /// Every failing field contributes one message; the caller decides how to
    /// surface them.
    pub fn parse(name: &str, email: &str, balance: &str) -> Result<Self, Vec<String>> {
        let name = normalize_name(name);
        let email = normalize_email(email);
        let balance = parse_balance(balance);

        match (name, email, balance) {
            (Ok(name), Ok(email), Ok(balance)) => Ok(Self {
                name,
                email,
                balance,
            }),
            (name, email, balance) => Err([name.err(), email.err(), balance.err()]
                .into_iter()
                .flatten()
                .collect()),
        }
    }
}

/// Partial update for a member's editable fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub balance: Option<Decimal>,
}

impl MemberPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.balance.is_none()
    }
}

/// Roster query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    pub status: Option<MemberStatus>,
    /// Case-insensitive substring match on name or email
    pub search: Option<String>,
}

impl MemberFilter {
    pub fn matches(&self, member: &Member) -> bool {
        if let Some(status) = self.status {
            if member.status() != status {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                member.name.to_lowercase().contains(&term) || member.email.contains(&term)
            }
            _ => true,
        }
    }
}

/// Capacity guard applied before any insert
pub fn ensure_capacity(existing: u64, incoming: u64) -> Result<(), DomainError> {
    if existing + incoming > MAX_MEMBERS {
        return Err(DomainError::Validation(format!(
            "Maximum {} members allowed. The pool has {} and {} more were requested.",
            MAX_MEMBERS, existing, incoming
        )));
    }
    Ok(())
}

/// Trim a display name and check its length
pub fn normalize_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("Name is required.".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!(
            "Name must be at most {} characters.",
            MAX_NAME_LEN
        ));
    }
    Ok(name.to_string())
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("email pattern is valid"))
}

/// Trim and lowercase an email address, then check its shape
pub fn normalize_email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err("Email is required.".to_string());
    }
    if !email_regex().is_match(&email) {
        return Err(format!("Enter a valid email address: '{}'.", email));
    }
    Ok(email)
}

/// Parse a wallet balance from text
pub fn parse_balance(raw: &str) -> Result<Decimal, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Balance is required.".to_string());
    }
    let balance =
        Decimal::from_str(raw).map_err(|_| format!("Balance must be a number: '{}'.", raw))?;
    normalize_balance(balance)
}

/// Check range and precision, then fix the scale at 2 like NUMERIC(10, 2)
///
/// Shared by every write path.
pub fn normalize_balance(mut balance: Decimal) -> Result<Decimal, String> {
    if balance < Decimal::ZERO {
        return Err("Wallet balance cannot be negative.".to_string());
    }
    if balance.normalize().scale() > 2 {
        return Err("Balance must have at most 2 decimal places.".to_string());
    }
    if balance >= Decimal::from(MAX_BALANCE_EXCLUSIVE) {
        return Err(format!(
            "Balance must be less than {}.",
            MAX_BALANCE_EXCLUSIVE
        ));
    }
    balance.rescale(2);
    Ok(balance)
}
