//! Mock process host for testing

use netpipe_api::Role;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::{ExitStatus, HostError, HostResult, ProcessHost};

/// SIGTERM on Linux
const SIGTERM: i32 = 15;

/// One call made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Probe(u32),
    Terminate(u32),
    Spawn { role: Role, argv: Vec<String>, pid: u32 },
}

/// A call plus when it happened
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: HostCall,
    pub at: Instant,
}

/// Mock process host for unit/integration testing
///
/// Spawned "processes" are just pids in a set. Exits are queued and handed
/// out by [`ProcessHost::try_reap`] in order.
pub struct MockHost {
    next_pid: AtomicU32,
    alive: Arc<Mutex<HashSet<u32>>>,
    exited: Arc<Mutex<VecDeque<(u32, ExitStatus)>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,

    /// Configure spawn to fail
    pub fail_spawn: Arc<Mutex<bool>>,

    /// Whether SIGTERM makes the process exit (true by default)
    pub exit_on_terminate: Arc<Mutex<bool>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            alive: Arc::new(Mutex::new(HashSet::new())),
            exited: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_spawn: Arc::new(Mutex::new(false)),
            exit_on_terminate: Arc::new(Mutex::new(true)),
        }
    }

    /// All calls so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls without timestamps
    pub fn call_log(&self) -> Vec<HostCall> {
        self.calls().into_iter().map(|c| c.call).collect()
    }

    /// Pids that are currently "running"
    pub fn running(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.alive.lock().unwrap().iter().copied().collect();
        pids.sort_unstable();
        pids
    }

    /// Simulate a process exiting on its own
    pub fn simulate_exit(&self, pid: u32, status: ExitStatus) {
        self.alive.lock().unwrap().remove(&pid);
        self.exited.lock().unwrap().push_back((pid, status));
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(RecordedCall {
            call,
            at: Instant::now(),
        });
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for MockHost {
    fn spawn(&self, role: Role, argv: &[String]) -> HostResult<u32> {
        if *self.fail_spawn.lock().unwrap() {
            return Err(HostError::SpawnFailed("Mock spawn failure".into()));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.alive.lock().unwrap().insert(pid);
        self.record(HostCall::Spawn {
            role,
            argv: argv.to_vec(),
            pid,
        });

        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.record(HostCall::Probe(pid));
        self.alive.lock().unwrap().contains(&pid)
    }

    fn terminate(&self, pid: u32) -> HostResult<()> {
        self.record(HostCall::Terminate(pid));
        if *self.exit_on_terminate.lock().unwrap() {
            self.simulate_exit(pid, ExitStatus::signaled(SIGTERM));
        }
        Ok(())
    }

    fn try_reap(&self) -> HostResult<Option<(u32, ExitStatus)>> {
        Ok(self.exited.lock().unwrap().pop_front())
    }
}
