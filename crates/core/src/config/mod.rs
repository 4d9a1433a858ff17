//! Pooled data source configuration with layered loading.
//!
//! A [`ConfigSource`] names which resource backs the settings:
//!
//! 1. `Default`: optional TOML file named by `KEEL_CONFIG_FILE`,
//!    overlaid with `KEEL_DB_*` environment variables
//! 2. `Test`: a fixture embedded at compile time
//! 3. `Path`: an explicit TOML file
//!
//! [`ConfigLoader`] loads the selected source once and memoizes the
//! parsed [`PoolSettings`] for subsequent calls.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Fixture backing [`ConfigSource::Test`].
const TEST_FIXTURE: &str = include_str!("../../config/test.toml");

/// Which resource describes the pooled data source.
///
/// Selection happens when a loader (or pool manager) is constructed and
/// is idempotent. Pointing a process at a different source after a pool
/// has been built requires tearing the pool down first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Production settings: `KEEL_CONFIG_FILE` plus `KEEL_DB_*` overrides.
    Default,
    /// The embedded test fixture.
    Test,
    /// An explicit TOML file. Must exist.
    Path(PathBuf),
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self::Default
    }
}

/// Settings for the pooled data source.
///
/// Keys the typed model does not know about are preserved verbatim in
/// `extra` and readable by name via [`PoolSettings::get`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// PostgreSQL host.
    #[serde(default = "default_host")]
    pub host: String,

    /// PostgreSQL port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    #[serde(default = "default_dbname")]
    pub dbname: String,

    /// Database user.
    #[serde(default = "default_user")]
    pub user: String,

    /// Database password.
    #[serde(default)]
    pub password: String,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Connection establishment timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Any further keys from the source, kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "keel".into()
}

fn default_user() -> String {
    "postgres".into()
}

fn default_pool_size() -> usize {
    16
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: String::new(),
            pool_size: default_pool_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
            extra: BTreeMap::new(),
        }
    }
}

impl PoolSettings {
    /// Connect timeout as Duration for use with the pool.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read a property outside the typed model, by name.
    ///
    /// The value is returned exactly as the source spelled it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(serde_json::Value::as_str)
    }

    /// Load and validate settings from `source`.
    ///
    /// For [`ConfigSource::Default`], precedence (highest wins):
    /// 1. Environment variables prefixed with `KEEL_DB_`
    /// 2. TOML file from `KEEL_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - A `Path` source does not exist
    /// - The source cannot be parsed into the settings model
    /// - Validation fails after loading
    pub fn load(source: &ConfigSource) -> Result<Self, ConfigError> {
        let defaults = Figment::from(Serialized::defaults(Self::default()));

        let figment = match source {
            ConfigSource::Default => {
                let mut figment = defaults;
                if let Ok(path) = std::env::var("KEEL_CONFIG_FILE") {
                    figment = figment.merge(Toml::file(&path));
                }
                figment.merge(
                    Env::prefixed("KEEL_DB_")
                        .map(|key| key.as_str().to_lowercase().into())
                        .split("__"),
                )
            }
            ConfigSource::Test => defaults.merge(Toml::string(TEST_FIXTURE)),
            ConfigSource::Path(path) => match std::fs::metadata(path) {
                Ok(_) => defaults.merge(Toml::file(path)),
                Err(io) => return Err(ConfigError::SourceNotFound { path: path.clone(), source: io }),
            },
        };

        let settings: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        settings.validate()?;

        Ok(settings)
    }
}

/// Loads the selected source once and hands out the parsed settings.
///
/// A successful parse is memoized; a failed load is not, so a caller may
/// fix the environment and retry.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    source: ConfigSource,
    loaded: OnceCell<PoolSettings>,
}

impl ConfigLoader {
    /// Create a loader over `source`.
    pub fn new(source: ConfigSource) -> Self {
        Self { source, loaded: OnceCell::new() }
    }

    /// The selected source.
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Resolved settings, loading them on first access.
    pub fn settings(&self) -> Result<&PoolSettings, ConfigError> {
        self.loaded.get_or_try_init(|| {
            let settings = PoolSettings::load(&self.source)?;
            tracing::debug!(source = ?self.source, host = %settings.host, dbname = %settings.dbname, "configuration loaded");
            Ok(settings)
        })
    }
}
