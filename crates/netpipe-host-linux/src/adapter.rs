//! Linux process host implementation

use netpipe_api::Role;
use netpipe_host_api::{ExitStatus, HostResult, ProcessHost};
use tracing::info;

use crate::process::{probe, reap_one, spawn_on_fabric, terminate};
use crate::PipeFabric;

/// Linux process host bound to one pipe fabric
pub struct LinuxHost {
    fabric: PipeFabric,
}

impl LinuxHost {
    pub fn new(fabric: PipeFabric) -> Self {
        Self { fabric }
    }

    pub fn fabric(&self) -> &PipeFabric {
        &self.fabric
    }

    /// Unlink a named fabric ahead of shutdown
    pub fn remove_fabric(&self) -> crate::FabricResult<()> {
        self.fabric.remove()
    }
}

impl ProcessHost for LinuxHost {
    fn spawn(&self, role: Role, argv: &[String]) -> HostResult<u32> {
        let pid = spawn_on_fabric(&self.fabric, role, argv)?;
        info!(role = %role, pid = pid, argv = ?argv, "Spawned process");
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        probe(pid)
    }

    fn terminate(&self, pid: u32) -> HostResult<()> {
        terminate(pid)
    }

    fn try_reap(&self) -> HostResult<Option<(u32, ExitStatus)>> {
        reap_one()
    }
}
