//! Test fixtures
//!
//! Factory functions for creating test data with sensible defaults.
//! Each fixture function creates a valid entity that can be customized.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::app::import_service::CandidateRow;
use crate::domain::entities::{Member, MemberId};

/// Parse a decimal literal
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Create an active test member with a specific name
///
/// The email is derived from the name so fixtures never collide.
pub fn test_member_named(name: &str) -> Member {
    let now = Utc::now();
    Member {
        id: MemberId(Uuid::new_v4()),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        balance: dec("10.00"),
        active: true,
        expired_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Create an active test member with a specific balance
pub fn test_member_with_balance(name: &str, balance: &str) -> Member {
    Member {
        balance: dec(balance),
        ..test_member_named(name)
    }
}

/// Create an active test member created at a specific time
pub fn test_member_created_at(name: &str, created_at: DateTime<Utc>) -> Member {
    Member {
        created_at,
        updated_at: created_at,
        ..test_member_named(name)
    }
}

/// Create a member that expired an hour ago and joined a day before that
pub fn test_expired_member(name: &str) -> Member {
    let expired_at = Utc::now() - Duration::hours(1);
    Member {
        active: false,
        expired_at: Some(expired_at),
        ..test_member_created_at(name, expired_at - Duration::days(1))
    }
}

/// Create an upload row at the given 1-based position
pub fn test_row(row_number: usize, name: &str, email: &str, balance: &str) -> CandidateRow {
    CandidateRow {
        row_number,
        name: name.to_string(),
        email: email.to_string(),
        balance: balance.to_string(),
    }
}
