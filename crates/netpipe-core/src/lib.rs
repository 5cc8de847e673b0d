//! Process supervision for netpiped
//!
//! This crate provides:
//! - The child table: one slot per role, shared with the reaper
//! - The supervisor: launch and graceful replace of a role's child
//! - The reaper: drains terminated children and labels them by role

mod reaper;
mod supervisor;
mod table;

pub use reaper::*;
pub use supervisor::*;
pub use table::*;
