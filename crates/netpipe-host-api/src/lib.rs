//! Host process interfaces for netpiped
//!
//! This crate defines the interface between the supervisor and the
//! platform-specific process primitives. It contains no platform code itself;
//! see `netpipe-host-linux` for the real implementation and [`MockHost`] for
//! tests.

mod mock;
mod status;
mod traits;

pub use mock::*;
pub use status::*;
pub use traits::*;
