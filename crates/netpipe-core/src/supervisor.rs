//! Process supervisor
//!
//! Owns at most one child per role. Launching a role that already has a live
//! child sends it SIGTERM, then blocks for a fixed grace interval before the
//! replacement is spawned, so two children never hold the same pipe end at
//! once. The old child's exit is not awaited; the grace interval is the only
//! separation between the two lifetimes.

use netpipe_api::{Launcher, Role};
use netpipe_host_api::{HostError, ProcessHost};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{lock_table, ChildState, ChildTable, Reaper, SharedChildTable};

/// Supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Empty argv")]
    EmptyArgv,

    #[error("Fork failed: {0}")]
    ForkFailed(#[source] HostError),

    #[error("Shutting down")]
    ShuttingDown,
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Launches and replaces the writer and reader children
pub struct Supervisor<H> {
    host: Arc<H>,
    table: SharedChildTable,
    grace: Duration,
    shutdown: AtomicBool,
}

impl<H: ProcessHost> Supervisor<H> {
    pub fn new(host: Arc<H>, grace: Duration) -> Self {
        Self {
            host,
            table: Arc::new(Mutex::new(ChildTable::new())),
            grace,
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Refuse further spawns, including one already waiting out its grace
    /// interval
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// The shared child table
    pub fn table(&self) -> SharedChildTable {
        self.table.clone()
    }

    /// Copy of the table at this instant
    pub fn snapshot(&self) -> ChildTable {
        lock_table(&self.table).clone()
    }

    /// Reaper sharing this supervisor's host and table
    pub fn reaper(&self) -> Reaper<H> {
        Reaper::new(self.host.clone(), self.table.clone())
    }

    /// Start the child for `role`, replacing a live one.
    ///
    /// Blocks the calling thread for the grace interval when a replace is
    /// needed. Returns the new pid once the spawn has been initiated; the
    /// child may still fail afterwards, which only the reaper observes.
    pub fn launch(&self, role: Role, argv: Vec<String>) -> SupervisorResult<u32> {
        if argv.is_empty() {
            return Err(SupervisorError::EmptyArgv);
        }
        if self.is_shut_down() {
            return Err(SupervisorError::ShuttingDown);
        }

        info!(role = %role, argv = ?argv, event = "launch", "Launch requested");

        let replaced = self.begin_replace(role);

        if let Some(old_pid) = replaced {
            info!(
                role = %role,
                pid = old_pid,
                grace_ms = self.grace.as_millis() as u64,
                event = "replace",
                "Waiting out grace interval"
            );
            // Without the lock, so the reaper can collect the old child meanwhile
            std::thread::sleep(self.grace);
        }

        // Held across spawn and record so a child that exits immediately is
        // still attributed to its role.
        let mut table = lock_table(&self.table);

        if self.is_shut_down() {
            info!(role = %role, argv = ?argv, event = "cancelled", "Shutdown requested, not spawning");
            return Err(SupervisorError::ShuttingDown);
        }

        let pid = self.host.spawn(role, &argv).map_err(|e| {
            error!(
                role = %role,
                pid = ?table.get(role).pid,
                event = "spawn_failed",
                argv = ?argv,
                error = %e,
                "Child failed to start"
            );
            SupervisorError::ForkFailed(e)
        })?;

        table.record_spawn(role, pid, argv);

        info!(role = %role, pid = pid, event = "started", "Child started");

        Ok(pid)
    }

    /// Signal the live child for `role`, if any. Returns its pid.
    fn begin_replace(&self, role: Role) -> Option<u32> {
        let mut table = lock_table(&self.table);
        let slot = table.get_mut(role);

        let pid = slot.live_pid()?;
        if !self.host.is_alive(pid) {
            return None;
        }

        if let Err(e) = self.host.terminate(pid) {
            warn!(role = %role, pid = pid, error = %e, "Failed to signal previous child");
        }
        slot.state = ChildState::ReplacePending;

        info!(role = %role, pid = pid, event = "terminate", "Sent SIGTERM to previous child");

        Some(pid)
    }
}

impl<H: ProcessHost> Launcher for Supervisor<H> {
    type Error = SupervisorError;

    fn launch(&self, role: Role, argv: Vec<String>) -> Result<u32, Self::Error> {
        Supervisor::launch(self, role, argv)
    }
}
