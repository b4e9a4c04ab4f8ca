use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

use super::{ObjectReader, ObjectStore, ObjectStoreError};

/// Local filesystem object store confined to a fixed set of root directories.
pub struct LocalStore {
    roots: Vec<PathBuf>,
}

impl LocalStore {
    /// Create (if needed) and canonicalize every root.
    pub fn new<P: AsRef<Path>>(roots: &[P]) -> Result<Self, std::io::Error> {
        let mut canonical = Vec::with_capacity(roots.len());
        for root in roots {
            std::fs::create_dir_all(root.as_ref())?;
            canonical.push(std::fs::canonicalize(root.as_ref())?);
        }
        Ok(Self { roots: canonical })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Whether `path` lies inside one of the roots, judged lexically.
    pub fn contains(&self, path: &Path) -> bool {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::CurDir));
        !escapes
            && self
                .roots
                .iter()
                .any(|root| path.starts_with(root) && path != root.as_path())
    }

    fn checked<'a>(&self, path: &'a Path) -> Result<&'a Path, ObjectStoreError> {
        if self.contains(path) {
            Ok(path)
        } else {
            Err(ObjectStoreError::OutsideRoot(path.display().to_string()))
        }
    }
}

fn not_found(path: &Path, e: std::io::Error) -> ObjectStoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ObjectStoreError::NotFound(path.display().to_string())
    } else {
        ObjectStoreError::Io(e)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, path: &Path, data: Bytes) -> Result<(), ObjectStoreError> {
        let path = self.checked(path)?;
        tokio::fs::write(path, &data).await?;
        Ok(())
    }

    async fn get(&self, path: &Path) -> Result<Bytes, ObjectStoreError> {
        let path = self.checked(path)?;
        let data = tokio::fs::read(path).await.map_err(|e| not_found(path, e))?;
        Ok(Bytes::from(data))
    }

    async fn read_text(&self, path: &Path) -> Result<String, ObjectStoreError> {
        let data = self.get(path).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    async fn open(&self, path: &Path) -> Result<ObjectReader, ObjectStoreError> {
        let path = self.checked(path)?;
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| not_found(path, e))?;
        let len = file.metadata().await?.len();
        Ok(ObjectReader {
            reader: Box::new(file),
            len,
        })
    }

    async fn delete(&self, path: &Path) -> Result<(), ObjectStoreError> {
        let path = self.checked(path)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool, ObjectStoreError> {
        let path = self.checked(path)?;
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), ObjectStoreError> {
        let from = self.checked(from)?;
        let to = self.checked(to)?;
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| not_found(from, e))
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, ObjectStoreError> {
        if !self.roots.iter().any(|root| root == dir) && !self.contains(dir) {
            return Err(ObjectStoreError::OutsideRoot(dir.display().to_string()));
        }
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}
