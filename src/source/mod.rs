mod http;
mod mock;
mod synthetic;
#[cfg(test)]
mod tests;

use crate::error::AcquisitionError;
use crate::frame::RawFrame;
use async_trait::async_trait;

pub use http::HttpFrameSource;
pub use mock::{ScriptedFrameSource, ScriptedResponse};
pub use synthetic::synthetic_jpeg;

/// One request for the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    /// Identifier the loop assigns to the resulting frame
    pub id: u64,
    /// Cache-defeating token, milliseconds since the Unix epoch
    pub token: u64,
}

impl FrameRequest {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            token: chrono::Utc::now().timestamp_millis().max(0) as u64,
        }
    }
}

/// Device that answers "give me the current frame"
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn fetch_frame(&self, request: FrameRequest) -> Result<RawFrame, AcquisitionError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}
