use crate::frame::RawFrame;
use crate::resource::{ResourceHandle, ResourceKind, ResourceTracker};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Most recent raw frame held for display
#[derive(Debug)]
pub struct PreviewHandle {
    frame: RawFrame,
    resource: ResourceHandle,
}

impl PreviewHandle {
    pub fn frame(&self) -> &RawFrame {
        &self.frame
    }

    pub fn handle_id(&self) -> u64 {
        self.resource.id()
    }
}

/// Holds at most one preview handle; installing a new one releases the old
pub struct PreviewSlot {
    current: Option<PreviewHandle>,
    tracker: ResourceTracker,
    mirror_path: Option<PathBuf>,
}

impl PreviewSlot {
    pub fn new(tracker: ResourceTracker, mirror_path: Option<PathBuf>) -> Self {
        Self {
            current: None,
            tracker,
            mirror_path,
        }
    }

    /// Release the previous preview and install `frame`
    pub fn replace(&mut self, frame: RawFrame) -> &PreviewHandle {
        // Old handle goes first so two are never outstanding at once
        if let Some(previous) = self.current.take() {
            debug!(
                "Releasing preview handle #{} (frame {})",
                previous.handle_id(),
                previous.frame.id
            );
        }

        let resource = self.tracker.acquire(ResourceKind::Preview);
        let handle = self.current.insert(PreviewHandle { frame, resource });

        if let Some(path) = &self.mirror_path {
            let path = path.clone();
            let data = handle.frame.data.clone();
            let frame_id = handle.frame.id;
            tokio::spawn(async move {
                if let Err(e) = write_atomic(&path, frame_id, &data).await {
                    warn!("Failed to mirror preview to {}: {}", path.display(), e);
                }
            });
        }

        handle
    }

    pub fn current(&self) -> Option<&PreviewHandle> {
        self.current.as_ref()
    }

    /// Release the preview on session end
    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Write through a sibling temp file so viewers never see a partial frame
pub(crate) async fn write_atomic(path: &Path, tag: u64, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "preview".to_string());
    let temp_path = path.with_file_name(format!(".{}.{}.part", file_name, tag));

    tokio::fs::write(&temp_path, data).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}
