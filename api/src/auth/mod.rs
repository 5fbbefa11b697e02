//! Authentication
//!
//! Every admin route requires `Authorization: Bearer <ADMIN_API_KEY>`.

pub mod admin_key;

pub use admin_key::{require_admin, AdminKey};
