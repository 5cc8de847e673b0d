//! Shared types for the netpipe API

use std::fmt;

/// Which end of the pipe a child is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// stdout is bound to the produce end
    Writer,
    /// stdin is bound to the consume end
    Reader,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Writer, Role::Reader];

    /// Match a keyword sent by a control client.
    ///
    /// Surrounding whitespace is ignored; matching is otherwise exact.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim() {
            "out" | "writer" | "prog_out" => Some(Role::Writer),
            "in" | "reader" | "prog_in" => Some(Role::Reader),
            _ => None,
        }
    }

    /// Short keyword used by clients when requesting this role
    pub fn keyword(&self) -> &'static str {
        match self {
            Role::Writer => "out",
            Role::Reader => "in",
        }
    }

    /// Label used in log records
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Writer => "writer",
            Role::Reader => "reader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can start (or restart) the child for a role.
///
/// Implemented by the process supervisor; the listener only sees this seam.
/// `launch` may block: a replace waits out a grace interval before spawning.
pub trait Launcher: Send + Sync + 'static {
    type Error: std::error::Error + Send + 'static;

    /// Start the child for `role`, returning the new pid once spawn is initiated
    fn launch(&self, role: Role, argv: Vec<String>) -> Result<u32, Self::Error>;
}
