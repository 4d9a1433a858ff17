//! Configuration validation rules.
//!
//! This module provides validation logic for `PoolSettings` values
//! after they have been loaded from a source.

use crate::config::PoolSettings;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration source not found: {path}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl PoolSettings {
    /// Validate settings after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `host`, `dbname`, or `user` is empty
    /// - `pool_size` is 0 or exceeds 128
    /// - `connect_timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid { field: "host".into(), reason: "must not be empty".into() });
        }
        if self.dbname.is_empty() {
            return Err(ConfigError::Invalid { field: "dbname".into(), reason: "must not be empty".into() });
        }
        if self.user.is_empty() {
            return Err(ConfigError::Invalid { field: "user".into(), reason: "must not be empty".into() });
        }

        if self.pool_size == 0 {
            return Err(ConfigError::Invalid { field: "pool_size".into(), reason: "must be at least 1".into() });
        }
        if self.pool_size > 128 {
            return Err(ConfigError::Invalid { field: "pool_size".into(), reason: "must not exceed 128".into() });
        }

        if self.connect_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "connect_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.connect_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "connect_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        Ok(())
    }
}
