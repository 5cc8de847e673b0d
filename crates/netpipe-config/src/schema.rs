//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Control listener settings
    #[serde(default)]
    pub server: RawServerConfig,

    /// Process supervisor settings
    #[serde(default)]
    pub supervisor: RawSupervisorConfig,

    /// Shared pipe settings
    #[serde(default)]
    pub fabric: RawFabricConfig,
}

impl Default for RawConfig {
    /// An empty file at the current version
    fn default() -> Self {
        Self {
            config_version: crate::CURRENT_CONFIG_VERSION,
            server: RawServerConfig::default(),
            supervisor: RawSupervisorConfig::default(),
            fabric: RawFabricConfig::default(),
        }
    }
}

/// Control listener settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawServerConfig {
    /// Bind address (default: 0.0.0.0)
    pub address: Option<String>,

    /// Bind port (default: 30000)
    pub port: Option<u16>,

    /// Listen backlog (default: 1)
    pub backlog: Option<u32>,
}

/// Process supervisor settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawSupervisorConfig {
    /// Delay between SIGTERM to an old child and spawning its replacement
    pub grace_ms: Option<u64>,
}

/// Shared pipe settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawFabricConfig {
    #[serde(default)]
    pub kind: RawFabricKind,

    /// FIFO path, named fabric only
    pub path: Option<PathBuf>,

    /// FIFO permission bits, named fabric only
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawFabricKind {
    #[default]
    Anonymous,
    Named,
}
