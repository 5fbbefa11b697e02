//! PostgreSQL adapters
//!
//! Implementations of repository traits using SeaORM and PostgreSQL.

pub mod member_repo;


pub use member_repo::PostgresMemberRepository;
