//! The shared pipe between the writer and reader children
//!
//! The daemon creates the fabric once and keeps both ends open for its whole
//! lifetime. Children never receive the daemon's descriptors directly; each
//! spawn gets a fresh duplicate of one end on its stdin or stdout.

use netpipe_api::Role;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{mkfifo, pipe2};
use std::fs::{File, OpenOptions, Permissions};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Pipe fabric errors
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("Failed to create pipe: {0}")]
    Create(#[from] nix::errno::Errno),

    #[error("Failed to remove stale fabric at {path}: {source}")]
    Stale {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FabricResult<T> = Result<T, FabricError>;

/// One end of the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabricEnd {
    /// Writable end, bound to a writer's stdout
    Produce,
    /// Readable end, bound to a reader's stdin
    Consume,
}

impl FabricEnd {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Writer => FabricEnd::Produce,
            Role::Reader => FabricEnd::Consume,
        }
    }
}

/// Single local byte channel with a produce end and a consume end
#[derive(Debug)]
pub struct PipeFabric {
    produce: OwnedFd,
    consume: OwnedFd,
    /// Set for a named fabric; unlinked on removal
    path: Mutex<Option<PathBuf>>,
}

impl PipeFabric {
    /// Create an unnamed kernel pipe.
    ///
    /// Both ends are close-on-exec so they only reach a child through an
    /// explicit duplicate.
    pub fn anonymous() -> FabricResult<Self> {
        let (consume, produce) = pipe2(OFlag::O_CLOEXEC)?;

        debug!(
            produce_fd = produce.as_raw_fd(),
            consume_fd = consume.as_raw_fd(),
            "Anonymous fabric created"
        );

        Ok(Self {
            produce,
            consume,
            path: Mutex::new(None),
        })
    }

    /// Create a FIFO at `path` and open both of its ends.
    ///
    /// Whatever is left at `path` from an earlier run is removed first.
    pub fn named(path: impl AsRef<Path>, mode: u32) -> FabricResult<Self> {
        let path = path.as_ref();

        remove_stale(path)?;

        mkfifo(path, Mode::from_bits_truncate(mode as nix::libc::mode_t))?;
        // mkfifo honors the umask; apply the requested bits exactly
        std::fs::set_permissions(path, Permissions::from_mode(mode))?;

        // The read end has to exist before a write open can succeed without
        // blocking, so open it non-blocking first.
        let consume = OpenOptions::new()
            .read(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(path)?;
        let produce = OpenOptions::new().write(true).open(path)?;

        let consume = OwnedFd::from(consume);
        let produce = OwnedFd::from(produce);
        clear_nonblocking(&consume)?;

        info!(path = %path.display(), mode = format!("{mode:#o}"), "Named fabric created");

        Ok(Self {
            produce,
            consume,
            path: Mutex::new(Some(path.to_path_buf())),
        })
    }

    /// Borrow one end
    pub fn end(&self, end: FabricEnd) -> BorrowedFd<'_> {
        match end {
            FabricEnd::Produce => self.produce.as_fd(),
            FabricEnd::Consume => self.consume.as_fd(),
        }
    }

    /// Fresh descriptor for `end`, owned by the caller
    pub fn duplicate(&self, end: FabricEnd) -> FabricResult<OwnedFd> {
        Ok(self.end(end).try_clone_to_owned()?)
    }

    /// Filesystem path of a named fabric, until it is removed
    pub fn path(&self) -> Option<PathBuf> {
        self.path.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Unlink a named fabric. The open ends stay usable.
    pub fn remove(&self) -> FabricResult<()> {
        let path = self.path.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(path) = path {
            remove_stale(&path)?;
            info!(path = %path.display(), "Named fabric removed");
        }
        Ok(())
    }
}

impl Drop for PipeFabric {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!(error = %e, "Failed to remove named fabric");
        }
    }
}

fn remove_stale(path: &Path) -> FabricResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale fabric object");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FabricError::Stale {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn clear_nonblocking(fd: &OwnedFd) -> FabricResult<()> {
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) & !OFlag::O_NONBLOCK;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Open a fabric end as a `File` (tests and diagnostics)
pub fn open_end(fabric: &PipeFabric, end: FabricEnd) -> FabricResult<File> {
    Ok(File::from(fabric.duplicate(end)?))
}
