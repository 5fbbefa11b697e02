//! Domain entities
//!
//! Pure domain models representing core business concepts.
//! These are separate from the SeaORM entities in the `entity` module.

pub mod member;

pub use member::{
    ensure_capacity, normalize_balance, normalize_email, normalize_name, Member, MemberFilter,
    MemberId, MemberPatch, MemberStatus, NewMember, MAX_MEMBERS,
};
