use crate::source::FrameRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recording lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Recording,
    Exporting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Recording => write!(f, "recording"),
            SessionState::Exporting => write!(f, "exporting"),
        }
    }
}

/// Text shown on the status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Idle,
    Recording,
    CameraError,
    PreparingArchive,
    DownloadReady,
    /// Export failed; carries the error's own message
    ExportFailed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::Recording => write!(f, "Recording..."),
            Status::CameraError => write!(f, "Camera error"),
            Status::PreparingArchive => write!(f, "Preparing ZIP..."),
            Status::DownloadReady => write!(f, "Download ready"),
            Status::ExportFailed(message) if message.trim().is_empty() => write!(f, "ZIP failed"),
            Status::ExportFailed(message) => write!(f, "{}", message),
        }
    }
}

/// A fetch the loop has been cleared to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub request: FrameRequest,
    /// Recording epoch the result belongs to; `None` for preview-only fetches
    pub recording_epoch: Option<u64>,
}

impl FetchTicket {
    pub fn for_recording(&self) -> bool {
        self.recording_epoch.is_some()
    }
}

/// Entry guard of the acquisition routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchGuard {
    Idle,
    FetchInFlight(FetchTicket),
}

impl FetchGuard {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, FetchGuard::FetchInFlight(_))
    }
}
