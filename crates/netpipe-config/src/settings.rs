//! Validated settings (converted from raw config)

use crate::schema::{RawConfig, RawFabricKind};
use netpipe_api::DEFAULT_PORT;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default bind address: all IPv4 interfaces
pub const DEFAULT_BIND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Default listen backlog; one queued client while a session runs
pub const DEFAULT_BACKLOG: u32 = 1;

/// Default delay between SIGTERM and spawning a replacement
pub const DEFAULT_GRACE: Duration = Duration::from_secs(1);

/// Default location of the named fabric
pub const DEFAULT_FIFO_PATH: &str = "/tmp/netpipe.fifo";

/// Default permission bits of the named fabric
pub const DEFAULT_FIFO_MODE: u32 = 0o666;

/// All daemon settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerConfig,
    pub supervisor: SupervisorConfig,
    pub fabric: FabricConfig,
}

/// Control listener settings. Immutable once the listener is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub bind_port: u16,
    pub backlog: u32,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.bind_port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS,
            bind_port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

/// Process supervisor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Fixed wait after signaling an old child, before its replacement spawns
    pub grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
        }
    }
}

/// Which kernel object backs the shared pipe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FabricConfig {
    /// Unnamed pipe, gone when the daemon exits
    #[default]
    Anonymous,
    /// FIFO at a filesystem path, recreated at startup and unlinked on shutdown
    Named { path: PathBuf, mode: u32 },
}

impl Settings {
    /// Convert from a raw config that already passed validation
    pub fn from_raw(raw: RawConfig) -> Self {
        let defaults = ServerConfig::default();

        let server = ServerConfig {
            bind_address: raw
                .server
                .address
                .and_then(|a| a.parse().ok())
                .unwrap_or(defaults.bind_address),
            bind_port: raw.server.port.unwrap_or(defaults.bind_port),
            backlog: raw.server.backlog.unwrap_or(defaults.backlog),
        };

        let supervisor = SupervisorConfig {
            grace: raw
                .supervisor
                .grace_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_GRACE),
        };

        let fabric = match raw.fabric.kind {
            RawFabricKind::Anonymous => FabricConfig::Anonymous,
            RawFabricKind::Named => FabricConfig::Named {
                path: raw
                    .fabric
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FIFO_PATH)),
                mode: raw.fabric.mode.unwrap_or(DEFAULT_FIFO_MODE),
            },
        };

        Self {
            server,
            supervisor,
            fabric,
        }
    }
}
