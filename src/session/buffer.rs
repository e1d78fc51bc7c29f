use crate::frame::CapturedFrame;

/// Frames recorded in the current session, in capture order
///
/// Frames can only be appended or cleared all at once.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    frames: Vec<CapturedFrame>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame and return the new length
    pub fn push(&mut self, frame: CapturedFrame) -> usize {
        self.frames.push(frame);
        self.frames.len()
    }

    /// Drop every frame, returning how many were held
    pub fn clear(&mut self) -> usize {
        let count = self.frames.len();
        self.frames.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    pub fn total_bytes(&self) -> usize {
        self.frames.iter().map(CapturedFrame::len).sum()
    }
}
