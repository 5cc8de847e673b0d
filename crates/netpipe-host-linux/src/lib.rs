//! Linux host for netpiped
//!
//! Provides:
//! - The pipe fabric: one kernel pipe (or named FIFO) shared by all children
//! - Process spawning with stdin/stdout rebound onto a fabric end
//! - Liveness probing and SIGTERM
//! - Non-blocking `waitpid` reaping

mod adapter;
mod fabric;
mod process;

pub use adapter::*;
pub use fabric::*;
pub use process::*;
