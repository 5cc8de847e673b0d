//! Configuration validation

use crate::schema::{RawConfig, RawFabricKind};
use std::net::IpAddr;
use thiserror::Error;

/// Longest grace interval accepted from configuration
pub const MAX_GRACE_MS: u64 = 60_000;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid bind address '{value}': {message}")]
    InvalidAddress { value: String, message: String },

    #[error("Backlog must be at least 1")]
    ZeroBacklog,

    #[error("Grace interval {0}ms exceeds {MAX_GRACE_MS}ms")]
    GraceTooLong(u64),

    #[error("Fabric error: {0}")]
    FabricError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(address) = &config.server.address
        && let Err(e) = address.parse::<IpAddr>()
    {
        errors.push(ValidationError::InvalidAddress {
            value: address.clone(),
            message: e.to_string(),
        });
    }

    if config.server.backlog == Some(0) {
        errors.push(ValidationError::ZeroBacklog);
    }

    if let Some(grace_ms) = config.supervisor.grace_ms
        && grace_ms > MAX_GRACE_MS
    {
        errors.push(ValidationError::GraceTooLong(grace_ms));
    }

    errors.extend(validate_fabric(config));

    errors
}

fn validate_fabric(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let fabric = &config.fabric;

    match fabric.kind {
        RawFabricKind::Anonymous => {
            if fabric.path.is_some() || fabric.mode.is_some() {
                errors.push(ValidationError::FabricError(
                    "path and mode only apply to a named fabric".into(),
                ));
            }
        }
        RawFabricKind::Named => {
            if let Some(path) = &fabric.path
                && !path.is_absolute()
            {
                errors.push(ValidationError::FabricError(format!(
                    "FIFO path must be absolute: {}",
                    path.display()
                )));
            }
            if let Some(mode) = fabric.mode
                && mode > 0o777
            {
                errors.push(ValidationError::FabricError(format!(
                    "FIFO mode {mode:#o} has bits outside 0o777"
                )));
            }
        }
    }

    errors
}
