mod local;

pub use local::LocalStore;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Path outside storage roots: {0}")]
    OutsideRoot(String),
}

/// A readable handle on a stored object.
pub struct ObjectReader {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub len: u64,
}

/// Abstraction over where uploaded bytes live.
/// Paths are the ones recorded in resource descriptors and must fall inside one of the store's roots.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &Path, data: Bytes) -> Result<(), ObjectStoreError>;
    async fn get(&self, path: &Path) -> Result<Bytes, ObjectStoreError>;
    async fn read_text(&self, path: &Path) -> Result<String, ObjectStoreError>;
    async fn open(&self, path: &Path) -> Result<ObjectReader, ObjectStoreError>;
    async fn delete(&self, path: &Path) -> Result<(), ObjectStoreError>;
    async fn exists(&self, path: &Path) -> Result<bool, ObjectStoreError>;
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), ObjectStoreError>;
    /// Regular files directly under `dir` (non-recursive).
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, ObjectStoreError>;
}
