//! Unified error types for keel.
//!
//! Configuration and pool-construction failures are normalized into one
//! family at the boundary of this layer, preserving the underlying cause
//! for diagnostics. A liveness probe that merely fails within its
//! deadline is reported as `false` by the probe, never as an `Error`.

use crate::config::ConfigError;

/// Failures surfaced by the shared-resource access layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration source missing, unreadable, or malformed.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// The pooling layer failed to initialize (bad address, rejected
    /// settings, driver unavailable).
    #[error("pool construction failed: {0}")]
    PoolBuild(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_build_display_includes_cause() {
        let cause = std::io::Error::other("driver rejected settings");
        let err = Error::PoolBuild(Box::new(cause));
        assert!(err.to_string().contains("pool construction failed"));
        assert!(err.to_string().contains("driver rejected settings"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::Invalid { field: "pool_size".into(), reason: "must be at least 1".into() }.into();
        assert!(matches!(err, Error::Config(_)));
    }
}
