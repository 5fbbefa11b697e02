//! Roster module
//!
//! Markdown rendering of members and ledger results for plain-text clients.

pub mod renderer;

pub use renderer::{render_bulk, render_import, render_member, render_roster, render_toggle};
