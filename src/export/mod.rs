mod archive;
mod download;

pub use archive::{archive_filename, build_archive, entry_name};
pub use download::{DirectoryDownload, DownloadSurface};

use crate::error::ExportError;
use crate::frame::CapturedFrame;
use crate::resource::{ResourceHandle, ResourceKind, ResourceTracker};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Result of a delivered export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    pub filename: String,
    pub entries: usize,
    pub bytes: usize,
    /// Where the download surface put the archive
    pub location: String,
}

/// Delivered archive still held for the download surface
struct PendingDownload {
    resource: ResourceHandle,
    _blob: Bytes,
}

/// Builds the archive for a recording and delivers it
pub struct ArchiveExporter {
    surface: Arc<dyn DownloadSurface>,
    tracker: ResourceTracker,
    release_delay: Duration,
    pending: Arc<Mutex<Option<PendingDownload>>>,
}

impl ArchiveExporter {
    pub fn new(
        surface: Arc<dyn DownloadSurface>,
        tracker: ResourceTracker,
        release_delay: Duration,
    ) -> Self {
        Self {
            surface,
            tracker,
            release_delay,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Serialize `frames` and hand the archive to the download surface
    ///
    /// The blob stays registered as a download resource for `release_delay`
    /// after delivery, then is released. On failure it is released at once.
    /// A newer export releases the previous blob before registering its own.
    pub async fn export(&self, frames: &[CapturedFrame]) -> Result<ExportReceipt, ExportError> {
        let entries = frames.len();
        let owned = frames.to_vec();
        let archive = tokio::task::spawn_blocking(move || build_archive(&owned))
            .await
            .map_err(|e| ExportError::Archive {
                details: e.to_string(),
            })?
            .map_err(|e| {
                error!("Archive build failed: {}", e);
                e
            })?;

        let filename = archive_filename(chrono::Utc::now().timestamp_millis());
        let blob = Bytes::from(archive);
        let bytes = blob.len();

        let mut pending = self.pending.lock().await;
        if let Some(previous) = pending.take() {
            debug!(
                "Releasing download handle #{} early for {}",
                previous.resource.id(),
                filename
            );
        }
        let resource = self.tracker.acquire(ResourceKind::Download);
        debug!(
            "Built {} with {} entries ({} bytes)",
            filename, entries, bytes
        );

        let location = self.surface.deliver(&filename, blob.clone()).await.map_err(|e| {
            error!("Failed to deliver {}: {}", filename, e);
            e
        })?;

        let handle_id = resource.id();
        *pending = Some(PendingDownload {
            resource,
            _blob: blob,
        });
        drop(pending);

        let slot = Arc::clone(&self.pending);
        let release_delay = self.release_delay;
        tokio::spawn(async move {
            tokio::time::sleep(release_delay).await;
            let mut pending = slot.lock().await;
            // Only release if no newer export replaced it
            if pending.as_ref().map(|p| p.resource.id()) == Some(handle_id) {
                debug!("Releasing download handle #{}", handle_id);
                pending.take();
            }
        });

        info!("Exported {} frames to {}", entries, location);
        Ok(ExportReceipt {
            filename,
            entries,
            bytes,
            location,
        })
    }
}
