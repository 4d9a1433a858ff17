//! Pooled PostgreSQL access for keel.
//!
//! This crate provides:
//! - A lazily built, single-flight connection pool manager
//! - A bounded-time liveness probe over that pool

pub mod pool;

pub use pool::{PoolManager, PoolState, PoolStatus};
