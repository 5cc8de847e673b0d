//! Process management utilities

use netpipe_api::Role;
use netpipe_host_api::{ExitStatus, HostError, HostResult};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::{FabricEnd, PipeFabric};

/// Spawn `argv` with the fabric end for `role` on its stdin or stdout.
///
/// The other stdio slots are inherited from the daemon. The returned pid is
/// not waited on here; termination is collected by [`reap_one`].
pub fn spawn_on_fabric(fabric: &PipeFabric, role: Role, argv: &[String]) -> HostResult<u32> {
    let Some((program, args)) = argv.split_first() else {
        return Err(HostError::SpawnFailed("Empty argv".into()));
    };

    let end = FabricEnd::for_role(role);
    let fd = fabric
        .duplicate(end)
        .map_err(|e| HostError::SpawnFailed(format!("Failed to duplicate {end:?} end: {e}")))?;

    let mut cmd = Command::new(program);
    cmd.args(args);

    match role {
        Role::Writer => cmd.stdout(Stdio::from(fd)),
        Role::Reader => cmd.stdin(Stdio::from(fd)),
    };

    let child = cmd
        .spawn()
        .map_err(|e| {
            warn!(role = %role, event = "exec_failed", program = %program, error = %e, "Child failed to start");
            HostError::SpawnFailed(format!("Failed to spawn {role} {program}: {e}"))
        })?;

    let pid = child.id();
    debug!(role = %role, pid = pid, program = %program, "Process spawned");

    // Dropping the handle neither kills nor waits; the reaper owns collection
    drop(child);

    Ok(pid)
}

/// Signal-0 liveness check
pub fn probe(pid: u32) -> bool {
    signal::kill(to_pid(pid), None).is_ok()
}

/// Send SIGTERM to a single process
pub fn terminate(pid: u32) -> HostResult<()> {
    match signal::kill(to_pid(pid), Signal::SIGTERM) {
        Ok(()) => {
            debug!(pid = pid, "Sent SIGTERM");
            Ok(())
        }
        // Process already gone
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(HostError::SignalFailed(format!(
            "Failed to send SIGTERM to {pid}: {e}"
        ))),
    }
}

/// Collect one terminated child of this process without blocking.
///
/// Returns `None` when no child has terminated, including when there are no
/// children at all.
pub fn reap_one() -> HostResult<Option<(u32, ExitStatus)>> {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                return Ok(Some((pid.as_raw() as u32, ExitStatus::with_code(code))));
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                return Ok(Some((pid.as_raw() as u32, ExitStatus::signaled(sig as i32))));
            }
            Ok(WaitStatus::StillAlive) => return Ok(None),
            // Stop/continue notifications are not terminations
            Ok(_) => continue,
            Err(Errno::ECHILD) => return Ok(None),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(HostError::WaitFailed(e.to_string())),
        }
    }
}

fn to_pid(pid: u32) -> Pid {
    Pid::from_raw(pid as i32)
}
