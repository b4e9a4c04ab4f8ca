//! shortcdn - short-code content host
//!
//! Clients upload a file, a code snippet or a long URL and get back a short
//! key. This crate provides:
//! - Collision-free short key generation against a persistent key store
//! - redb embedded key store (ACID, crash-safe) holding tagged resource descriptors
//! - Per-kind dispatch: snippet view, redirect, or file stream, with lazy
//!   cleanup of descriptors whose files have vanished
//! - Size-scaled retention that reaps old uploads out of band

pub mod api;
pub mod codegen;
pub mod config;
pub mod dispatch;
pub mod object_store;
pub mod retention;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::Config;
use storage::KeyStore;

/// Canonical upload directories.
#[derive(Debug, Clone)]
pub struct StorageRoots {
    pub upload: PathBuf,
    pub admin: PathBuf,
}

impl StorageRoots {
    /// Create both roots if missing and resolve them to absolute paths.
    pub fn prepare(config: &config::StorageConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.upload_path)?;
        std::fs::create_dir_all(&config.upload_path_admin)?;
        Ok(Self {
            upload: std::fs::canonicalize(&config.upload_path)?,
            admin: std::fs::canonicalize(&config.upload_path_admin)?,
        })
    }
}

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub roots: StorageRoots,
    /// `None` when the store failed its startup probe; key operations then report unavailable.
    pub keys: Option<KeyStore>,
    pub object_store: Arc<dyn object_store::ObjectStore>,
}

/// Open the key store and probe it, giving up after `timeout`.
///
/// Returns `None` (degraded mode) if opening fails, the probe fails, or the
/// probe does not finish in time.
pub async fn open_key_store<P: AsRef<Path>>(data_dir: P, timeout: Duration) -> Option<KeyStore> {
    let data_dir = data_dir.as_ref().to_path_buf();
    let task = tokio::task::spawn_blocking(move || {
        let keys = KeyStore::open(&data_dir)
            .map_err(|e| tracing::error!(error = %e, "Failed to open key store"))
            .ok()?;
        keys.probe().then_some(keys)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(keys)) => keys,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Key store probe task failed");
            None
        }
        Err(_) => {
            tracing::error!(timeout_secs = timeout.as_secs(), "Key store probe timed out");
            None
        }
    }
}
