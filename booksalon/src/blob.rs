//! Binary storage for profile images.

use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::errors::{RemoteService, SalonError};

#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Stores `bytes` under `path` and returns the public URL.
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, SalonError>;

    /// Removes the blob behind a URL returned by `upload`. Unknown URLs are ignored.
    async fn delete(&self, url: &str) -> Result<(), SalonError>;
}

/// Blob store writing under a local directory and serving from a base URL.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, SalonError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let safe = relative.components().all(|component| matches!(component, Component::Normal(_)));
        if !safe || path.trim().is_empty() {
            return Err(SalonError::remote(RemoteService::BlobStore, format!("invalid blob path: {path}")));
        }
        Ok(self.root.join(relative))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn io_error(err: std::io::Error) -> SalonError {
    SalonError::remote(RemoteService::BlobStore, err.to_string())
}

impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, SalonError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&target, bytes).await.map_err(io_error)?;
        debug!("stored {} bytes ({content_type}) at {}", bytes.len(), target.display());
        Ok(self.url_for(path))
    }

    async fn delete(&self, url: &str) -> Result<(), SalonError> {
        let Some(path) = url.strip_prefix(&self.base_url) else {
            return Ok(());
        };
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(err)),
        }
    }
}
