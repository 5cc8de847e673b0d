//! Configuration parsing and validation for netpiped
//!
//! Supports an optional TOML file with:
//! - Versioned schema
//! - Control listener address, port and backlog
//! - Supervisor grace interval
//! - Pipe fabric kind (anonymous pipe or named FIFO)
//!
//! Every setting has a default, so running without a file is normal.

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    resolve_config(read_config(path)?)
}

/// Read a TOML file without validating it, so callers can layer overrides
/// on top before calling [`resolve_config`]
pub fn read_config(path: impl AsRef<Path>) -> ConfigResult<RawConfig> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Reading config file");
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    resolve_config(toml::from_str(content)?)
}

/// Check version and validate, then fill in defaults
pub fn resolve_config(raw: RawConfig) -> ConfigResult<Settings> {
    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Settings::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn parse_minimal_config() {
        let settings = parse_config("config_version = 1").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [server]
            address = "127.0.0.1"
            port = 4000
            backlog = 2

            [supervisor]
            grace_ms = 250

            [fabric]
            kind = "named"
            path = "/run/netpipe/pipe"
            mode = 0o600
        "#;

        let settings = parse_config(config).unwrap();
        assert_eq!(settings.server.bind_address.to_string(), "127.0.0.1");
        assert_eq!(settings.server.bind_port, 4000);
        assert_eq!(settings.server.backlog, 2);
        assert_eq!(settings.supervisor.grace, Duration::from_millis(250));
        assert_eq!(
            settings.fabric,
            FabricConfig::Named {
                path: "/run/netpipe/pipe".into(),
                mode: 0o600,
            }
        );
    }

    #[test]
    fn named_fabric_defaults() {
        let config = r#"
            config_version = 1
            [fabric]
            kind = "named"
        "#;

        let settings = parse_config(config).unwrap();
        assert_eq!(
            settings.fabric,
            FabricConfig::Named {
                path: DEFAULT_FIFO_PATH.into(),
                mode: DEFAULT_FIFO_MODE,
            }
        );
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_unknown_fabric_kind() {
        let config = r#"
            config_version = 1
            [fabric]
            kind = "socketpair"
        "#;
        assert!(matches!(parse_config(config), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn validation_errors_are_collected() {
        let config = r#"
            config_version = 1
            [server]
            address = "not-an-ip"
            backlog = 0
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config_version = 1\n[server]\nport = 31000").unwrap();

        let settings = load_config(file.path()).unwrap();
        assert_eq!(settings.server.bind_port, 31000);
    }

    #[test]
    fn overrides_are_validated() {
        let mut raw = parse_raw("config_version = 1");
        raw.supervisor.grace_ms = Some(MAX_GRACE_MS + 1);
        raw.fabric.kind = RawFabricKind::Named;
        raw.fabric.path = Some("relative.fifo".into());

        match resolve_config(raw) {
            Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn default_raw_config_resolves_to_defaults() {
        assert_eq!(resolve_config(RawConfig::default()).unwrap(), Settings::default());
    }

    fn parse_raw(content: &str) -> RawConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
}
