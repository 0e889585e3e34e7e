use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// URL prefix under which the local store's files are served.
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Storage for uploaded media bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Where a browser can fetch the blob.
    fn url_for(&self, name: &str) -> String;

    /// Removes a blob. Missing blobs are not an error.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Blob names are flat: no separators, no parent references.
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(AppError::BlobStore(format!("invalid blob name: {:?}", name)));
    }
    Ok(())
}

/// Files under a local directory, served by the router's static file layer.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        check_name(name)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.root.join(name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            tracing::error!("❌ Failed to write blob {}: {}", name, e);
            AppError::Io(e)
        })?;

        tracing::debug!("💾 Stored blob {} ({} bytes)", name, bytes.len());
        Ok(())
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", MEDIA_URL_PREFIX, name)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Blobs held in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        check_name(name)?;
        self.blobs.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", MEDIA_URL_PREFIX, name)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.blobs.remove(name);
        Ok(())
    }
}
