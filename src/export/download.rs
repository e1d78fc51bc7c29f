use crate::error::ExportError;
use crate::preview::write_atomic;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::info;

/// Where exported archives are handed over to the operator
#[async_trait]
pub trait DownloadSurface: Send + Sync {
    /// Save `blob` under `filename`; returns where it ended up
    async fn deliver(&self, filename: &str, blob: Bytes) -> Result<String, ExportError>;
}

/// Saves archives into a local directory
pub struct DirectoryDownload {
    dir: PathBuf,
}

impl DirectoryDownload {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl DownloadSurface for DirectoryDownload {
    async fn deliver(&self, filename: &str, blob: Bytes) -> Result<String, ExportError> {
        let path = self.dir.join(filename);
        write_atomic(&path, 0, &blob)
            .await
            .map_err(|e| ExportError::Delivery {
                filename: filename.to_string(),
                source: e,
            })?;

        info!("Saved {} ({} bytes)", path.display(), blob.len());
        Ok(path.display().to_string())
    }
}
