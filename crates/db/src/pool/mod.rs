//! Pooled PostgreSQL data source with lazy, single-flight construction.
//!
//! [`PoolManager`] owns one pool built from one configuration source.
//! The pool is built on first use, exactly once even under concurrent
//! first callers, and [`PoolManager::ping`] bounds its
//! acquire-and-validate probe by a caller-supplied deadline.

mod slot;

use std::time::Duration;

use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use keel_core::Error;
use keel_core::config::{ConfigLoader, ConfigSource, PoolSettings};
use tokio_postgres::NoTls;

use slot::Slot;

/// Whether the managed pool has been constructed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Unbuilt,
    Ready,
}

/// Point-in-time view of the managed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub state: PoolState,
    /// Connections currently held by the pool, checked out or idle.
    pub size: usize,
    /// Idle connections available for checkout.
    pub available: usize,
    /// Upper bound on pool size.
    pub max_size: usize,
}

/// Lazily built, shared connection pool over one configuration source.
///
/// One manager corresponds to one active configuration. To point at a
/// different source, [`close`](Self::close) the pool and construct a
/// fresh manager; re-configuring a live pool is not supported.
pub struct PoolManager {
    config: ConfigLoader,
    pool: Slot<Pool>,
}

impl PoolManager {
    /// Create a manager over `source`. No I/O happens until first use.
    pub fn new(source: ConfigSource) -> Self {
        Self { config: ConfigLoader::new(source), pool: Slot::new() }
    }

    /// The resolved pool settings, loading them on first access.
    pub fn settings(&self) -> Result<&PoolSettings, Error> {
        Ok(self.config.settings()?)
    }

    /// Probe the database, bounded by `timeout_secs`.
    ///
    /// Builds the pool first if this is the first use. Returns `true` if
    /// a connection was acquired and validated within the deadline,
    /// `false` if the deadline elapsed or validation failed. Only
    /// configuration or pool-construction failures are an `Err`; a
    /// routine probe failure is not. A zero timeout reports `false`.
    pub async fn ping(&self, timeout_secs: u64) -> Result<bool, Error> {
        let pool = self.pool().await?;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);

        let client = match tokio::time::timeout_at(deadline, pool.get()).await {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "ping: could not acquire a connection");
                return Ok(false);
            }
            Err(_) => {
                tracing::debug!(timeout_secs, "ping: deadline elapsed while acquiring");
                return Ok(false);
            }
        };

        match tokio::time::timeout_at(deadline, client.simple_query("SELECT 1")).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "ping: connection failed validation");
                Ok(false)
            }
            Err(_) => {
                tracing::debug!(timeout_secs, "ping: deadline elapsed while validating");
                Ok(false)
            }
        }
    }

    /// Current pool state and counters.
    pub async fn status(&self) -> PoolStatus {
        match self.pool.peek().await {
            Some(pool) => {
                let status = pool.status();
                PoolStatus {
                    state: PoolState::Ready,
                    size: status.size,
                    available: status.available,
                    max_size: status.max_size,
                }
            }
            None => PoolStatus { state: PoolState::Unbuilt, size: 0, available: 0, max_size: 0 },
        }
    }

    /// Tear the pool down, returning the manager to the unbuilt state.
    ///
    /// The next `ping` rebuilds from the same source. Required before a
    /// process switches to a different configuration.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.take().await {
            pool.close();
            tracing::info!("connection pool closed");
        }
    }

    async fn pool(&self) -> Result<Pool, Error> {
        let settings = self.config.settings().map_err(Error::from)?;
        self.pool.get_or_try_init(|| build_pool(settings)).await
    }
}

/// Build a deadpool pool from resolved settings. Does not connect.
fn build_pool(settings: &PoolSettings) -> Result<Pool, Error> {
    let mut cfg = Config::new();
    cfg.host = Some(settings.host.clone());
    cfg.port = Some(settings.port);
    cfg.dbname = Some(settings.dbname.clone());
    cfg.user = Some(settings.user.clone());
    cfg.password = Some(settings.password.clone());
    cfg.connect_timeout = Some(settings.connect_timeout());
    cfg.pool = Some(PoolConfig::new(settings.pool_size));

    cfg.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Fast });

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| Error::PoolBuild(Box::new(e)))?;

    tracing::info!(host = %settings.host, dbname = %settings.dbname, pool_size = settings.pool_size, "connection pool created");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::config::ConfigError;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Instant;

    // 127.0.0.1:1 refuses connections; nothing listens there.
    const REFUSED: &str =
        "host = \"127.0.0.1\"\nport = 1\ndbname = \"keel_test\"\nuser = \"keel\"\nconnect_timeout_ms = 500\n";

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{body}").unwrap();
        file
    }

    #[tokio::test]
    async fn test_build_pool_does_not_connect() {
        let settings = PoolSettings { host: "127.0.0.1".into(), port: 1, pool_size: 3, ..Default::default() };
        let pool = build_pool(&settings).unwrap();
        assert_eq!(pool.status().max_size, 3);
    }

    #[tokio::test]
    async fn test_ping_unreachable_returns_false() {
        let file = write_config(REFUSED);
        let manager = PoolManager::new(ConfigSource::Path(file.path().to_path_buf()));

        assert!(!manager.ping(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_ping_is_bounded_by_timeout() {
        // 10.255.255.1 is unrouteable; the connect attempt either hangs
        // (cut by the deadline) or fails fast. Both report false.
        let file = write_config(
            "host = \"10.255.255.1\"\ndbname = \"keel\"\nuser = \"keel\"\nconnect_timeout_ms = 30000\n",
        );
        let manager = PoolManager::new(ConfigSource::Path(file.path().to_path_buf()));

        let started = Instant::now();
        let alive = manager.ping(1).await.unwrap();
        assert!(!alive);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_ping_missing_config_is_configuration_error() {
        let manager = PoolManager::new(ConfigSource::Path("/nonexistent/keel.toml".into()));
        let result = manager.ping(1).await;
        assert!(matches!(result, Err(Error::Config(ConfigError::SourceNotFound { .. }))));
    }

    #[tokio::test]
    async fn test_close_returns_to_unbuilt() {
        let file = write_config(REFUSED);
        let manager = PoolManager::new(ConfigSource::Path(file.path().to_path_buf()));
        assert_eq!(manager.status().await.state, PoolState::Unbuilt);

        let _ = manager.ping(1).await.unwrap();
        assert_eq!(manager.status().await.state, PoolState::Ready);

        manager.close().await;
        assert_eq!(manager.status().await.state, PoolState::Unbuilt);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_pings_share_one_pool() {
        let file = write_config(REFUSED);
        let manager = Arc::new(PoolManager::new(ConfigSource::Path(file.path().to_path_buf())));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move { manager.ping(2).await }));
        }
        for handle in handles {
            assert!(!handle.await.unwrap().unwrap());
        }

        // All callers drove the same build; the pool reports one consistent bound.
        assert_eq!(manager.status().await.max_size, manager.settings().unwrap().pool_size);
    }

    #[tokio::test]
    async fn test_settings_passthrough() {
        let manager = PoolManager::new(ConfigSource::Test);
        assert_eq!(manager.settings().unwrap().get("key"), Some("TEST00001==/"));
    }
}
