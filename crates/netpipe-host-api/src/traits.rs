//! Host process traits

use netpipe_api::Role;
use thiserror::Error;

use crate::ExitStatus;

/// Errors from host process operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Signal failed: {0}")]
    SignalFailed(String),

    #[error("Wait failed: {0}")]
    WaitFailed(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Process primitives the supervisor and reaper are built on.
///
/// Every method is non-blocking except `spawn`, which returns as soon as the
/// child exists.
pub trait ProcessHost: Send + Sync + 'static {
    /// Spawn `argv` with the stdio slot for `role` bound to the shared pipe.
    /// Returns the child's pid.
    fn spawn(&self, role: Role, argv: &[String]) -> HostResult<u32>;

    /// Liveness probe (signal 0)
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask the process to terminate (SIGTERM)
    fn terminate(&self, pid: u32) -> HostResult<()>;

    /// Collect one already-terminated child, if any. Never blocks.
    fn try_reap(&self) -> HostResult<Option<(u32, ExitStatus)>>;
}
