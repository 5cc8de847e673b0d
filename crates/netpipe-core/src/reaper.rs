//! Child reaper
//!
//! Collects every terminated child in one activation and labels it with the
//! role it was launched for. It is driven from a different execution context
//! than the supervisor (the SIGCHLD task), so all table access goes through
//! the shared lock.

use netpipe_host_api::{ExitStatus, ProcessHost};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{lock_table, SharedChildTable};

pub struct Reaper<H> {
    host: Arc<H>,
    table: SharedChildTable,
}

impl<H> Clone for Reaper<H> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            table: self.table.clone(),
        }
    }
}

impl<H: ProcessHost> Reaper<H> {
    pub fn new(host: Arc<H>, table: SharedChildTable) -> Self {
        Self { host, table }
    }

    /// Collect all children that have terminated so far. Never blocks.
    ///
    /// Returns how many were collected.
    pub fn drain(&self) -> usize {
        let mut reaped = 0;

        loop {
            match self.host.try_reap() {
                Ok(Some((pid, status))) => {
                    reaped += 1;
                    self.record(pid, status);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to collect child status");
                    break;
                }
            }
        }

        reaped
    }

    fn record(&self, pid: u32, status: ExitStatus) {
        let role = lock_table(&self.table).mark_exited(pid, status);

        match role {
            Some(role) if status.is_success() => {
                info!(role = %role, pid = pid, event = "exited", status = %status, "Child exited");
            }
            Some(role) => {
                warn!(role = %role, pid = pid, event = "exited", status = %status, "Child failed");
            }
            None => {
                info!(pid = pid, event = "exited", status = %status, "Untracked child exited");
            }
        }
    }
}
