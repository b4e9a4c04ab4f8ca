//! Resolution of a requested short key to a response behavior.
//!
//! The only mutation on this path is tombstone cleanup: a code or file
//! descriptor whose backing file has vanished is deleted from the key store
//! and the request fails as gone rather than not found.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};

use crate::object_store::{ObjectReader, ObjectStore, ObjectStoreError};
use crate::storage::models::ResourceDescriptor;
use crate::storage::{DatabaseError, KeyStore};

/// Lines shown in the snippet preview.
pub const PREVIEW_LINES: usize = 10;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("Content for key {0} is gone")]
    Gone(String),
    #[error("Key store error: {0}")]
    Store(#[from] DatabaseError),
    #[error("Object store error: {0}")]
    Object(#[from] ObjectStoreError),
}

/// A code entry ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub key: String,
    pub preview: String,
    pub content: String,
    /// Highlighting hint from the requested extension, empty if none.
    pub language: String,
}

pub enum Resolution {
    Snippet(Snippet),
    Redirect(String),
    File {
        key: String,
        mime_type: String,
        reader: ObjectReader,
    },
}

/// Split `abc123.txt` into the lookup key and the requested extension.
pub fn split_segment(segment: &str) -> (&str, Option<&str>) {
    let name = segment.rsplit('/').next().unwrap_or(segment);
    match name.rsplit_once('.') {
        Some((key, ext)) if !key.is_empty() => (key, Some(ext)),
        _ => (name, None),
    }
}

fn preview(content: &str) -> String {
    content
        .split_inclusive('\n')
        .take(PREVIEW_LINES)
        .collect()
}

/// Best-effort removal of a descriptor whose backing file is gone.
pub fn tombstone(keys: &KeyStore, key: &str) {
    match keys.delete(key) {
        Ok(_) => tracing::info!(key = %key, "Removed descriptor with missing backing file"),
        Err(e) => tracing::warn!(key = %key, error = %e, "Failed to remove stale descriptor"),
    }
}

/// Resolve a path segment such as `abc123` or `abc123.py`.
pub async fn resolve(
    keys: &KeyStore,
    objects: &dyn ObjectStore,
    segment: &str,
) -> Result<Resolution, DispatchError> {
    let (key, ext) = split_segment(segment);
    tracing::debug!(key = %key, "Resolving key");

    let value = keys
        .get(key)?
        .ok_or_else(|| DispatchError::NotFound(key.to_string()))?;
    let descriptor = value.descriptor().ok_or_else(|| {
        tracing::warn!(key = %key, "Stored value is not a resource descriptor");
        DispatchError::NotFound(key.to_string())
    })?;

    match descriptor {
        ResourceDescriptor::Code { path, .. } => {
            let content = match objects.read_text(Path::new(&path)).await {
                Ok(content) => content,
                Err(ObjectStoreError::NotFound(_)) => {
                    tombstone(keys, key);
                    return Err(DispatchError::Gone(key.to_string()));
                }
                Err(e) => return Err(outside_root_as_not_found(key, e)),
            };
            Ok(Resolution::Snippet(Snippet {
                key: key.to_string(),
                preview: preview(&content),
                content,
                language: ext.unwrap_or_default().to_string(),
            }))
        }
        ResourceDescriptor::Short { target } => {
            tracing::debug!(key = %key, target = %target, "Redirecting short link");
            Ok(Resolution::Redirect(target))
        }
        ResourceDescriptor::File { path, mimetype } => {
            let path = Path::new(&path);
            let present = objects
                .exists(path)
                .await
                .map_err(|e| outside_root_as_not_found(key, e))?;
            if !present {
                tombstone(keys, key);
                return Err(DispatchError::Gone(key.to_string()));
            }
            let reader = match objects.open(path).await {
                Ok(reader) => reader,
                Err(ObjectStoreError::NotFound(_)) => {
                    tombstone(keys, key);
                    return Err(DispatchError::Gone(key.to_string()));
                }
                Err(e) => return Err(e.into()),
            };
            Ok(Resolution::File {
                key: key.to_string(),
                mime_type: mimetype,
                reader,
            })
        }
    }
}

fn outside_root_as_not_found(key: &str, e: ObjectStoreError) -> DispatchError {
    match e {
        ObjectStoreError::OutsideRoot(path) => {
            tracing::warn!(key = %key, path = %path, "Descriptor points outside storage roots");
            DispatchError::NotFound(key.to_string())
        }
        other => other.into(),
    }
}

/// Reader that removes the key from the store if the underlying read fails.
///
/// Once the response status has gone out, a failure can only cut the body
/// short; the cleanup still runs so the next request sees a clean miss.
pub struct TombstoneOnError<R> {
    inner: R,
    cleanup: Option<(KeyStore, String)>,
}

impl<R> TombstoneOnError<R> {
    pub fn new(inner: R, keys: KeyStore, key: String) -> Self {
        Self {
            inner,
            cleanup: Some((keys, key)),
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TombstoneOnError<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let result = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Err(e)) = &result {
            if let Some((keys, key)) = self.cleanup.take() {
                tracing::warn!(key = %key, error = %e, "File stream failed mid-transfer");
                tokio::task::spawn_blocking(move || tombstone(&keys, &key));
            }
        }
        result
    }
}
