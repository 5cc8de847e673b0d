//! Child process table

use netpipe_api::Role;
use netpipe_host_api::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of a role's child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    /// Never launched
    Absent,
    /// Spawned and not yet observed to exit
    Running,
    /// SIGTERM sent, replacement waiting out the grace interval
    ReplacePending,
    /// Termination collected by the reaper
    Exited(ExitStatus),
}

/// The tracked child for one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildProcess {
    pub role: Role,
    pub pid: Option<u32>,
    pub argv: Vec<String>,
    pub state: ChildState,
}

impl ChildProcess {
    fn absent(role: Role) -> Self {
        Self {
            role,
            pid: None,
            argv: Vec::new(),
            state: ChildState::Absent,
        }
    }

    /// Running or about to be replaced
    pub fn is_live(&self) -> bool {
        matches!(self.state, ChildState::Running | ChildState::ReplacePending)
    }

    /// Pid of a live child
    pub fn live_pid(&self) -> Option<u32> {
        if self.is_live() { self.pid } else { None }
    }
}

/// One slot per role.
///
/// Slots are overwritten, never removed, so a role can never have two
/// entries.
#[derive(Debug, Clone)]
pub struct ChildTable {
    writer: ChildProcess,
    reader: ChildProcess,
}

impl ChildTable {
    pub fn new() -> Self {
        Self {
            writer: ChildProcess::absent(Role::Writer),
            reader: ChildProcess::absent(Role::Reader),
        }
    }

    pub fn get(&self, role: Role) -> &ChildProcess {
        match role {
            Role::Writer => &self.writer,
            Role::Reader => &self.reader,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut ChildProcess {
        match role {
            Role::Writer => &mut self.writer,
            Role::Reader => &mut self.reader,
        }
    }

    /// Role whose live child has this pid
    pub fn role_of(&self, pid: u32) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| self.get(*role).live_pid() == Some(pid))
    }

    /// Overwrite the slot for `role` with a freshly spawned child
    pub fn record_spawn(&mut self, role: Role, pid: u32, argv: Vec<String>) {
        *self.get_mut(role) = ChildProcess {
            role,
            pid: Some(pid),
            argv,
            state: ChildState::Running,
        };
    }

    /// Mark the live child with `pid` as exited. Returns its role if tracked.
    pub fn mark_exited(&mut self, pid: u32, status: ExitStatus) -> Option<Role> {
        let role = self.role_of(pid)?;
        self.get_mut(role).state = ChildState::Exited(status);
        Some(role)
    }
}

impl Default for ChildTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Child table shared between the supervisor and the reaper
pub type SharedChildTable = Arc<Mutex<ChildTable>>;

/// Lock the shared table.
///
/// Every critical section leaves the table consistent, so a poisoned lock
/// is still safe to use.
pub fn lock_table(table: &SharedChildTable) -> MutexGuard<'_, ChildTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn new_table_is_absent() {
        let table = ChildTable::new();
        for role in Role::ALL {
            let child = table.get(role);
            assert_eq!(child.role, role);
            assert_eq!(child.state, ChildState::Absent);
            assert_eq!(child.live_pid(), None);
        }
    }

    #[test]
    fn record_spawn_overwrites_slot() {
        let mut table = ChildTable::new();
        table.record_spawn(Role::Writer, 10, argv("cat a"));
        table.record_spawn(Role::Writer, 11, argv("cat b"));

        let writer = table.get(Role::Writer);
        assert_eq!(writer.pid, Some(11));
        assert_eq!(writer.argv, argv("cat b"));
        assert_eq!(writer.state, ChildState::Running);
        assert_eq!(table.get(Role::Reader).state, ChildState::Absent);
    }

    #[test]
    fn mark_exited_keeps_entry() {
        let mut table = ChildTable::new();
        table.record_spawn(Role::Reader, 20, argv("wc -c"));

        assert_eq!(table.mark_exited(20, ExitStatus::success()), Some(Role::Reader));

        let reader = table.get(Role::Reader);
        assert_eq!(reader.pid, Some(20));
        assert_eq!(reader.argv, argv("wc -c"));
        assert_eq!(reader.state, ChildState::Exited(ExitStatus::success()));
        assert_eq!(reader.live_pid(), None);
    }

    #[test]
    fn unknown_pid_not_matched() {
        let mut table = ChildTable::new();
        table.record_spawn(Role::Writer, 30, argv("yes"));
        assert_eq!(table.mark_exited(31, ExitStatus::success()), None);
        assert_eq!(table.get(Role::Writer).state, ChildState::Running);
    }

    #[test]
    fn exited_pid_not_matched_twice() {
        let mut table = ChildTable::new();
        table.record_spawn(Role::Writer, 40, argv("yes"));
        table.mark_exited(40, ExitStatus::with_code(1));
        assert_eq!(table.mark_exited(40, ExitStatus::success()), None);
        assert_eq!(
            table.get(Role::Writer).state,
            ChildState::Exited(ExitStatus::with_code(1))
        );
    }

    #[test]
    fn replace_pending_is_live() {
        let mut table = ChildTable::new();
        table.record_spawn(Role::Writer, 50, argv("yes"));
        table.get_mut(Role::Writer).state = ChildState::ReplacePending;
        assert_eq!(table.role_of(50), Some(Role::Writer));
    }
}
