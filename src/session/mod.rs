mod buffer;
mod interval;
mod state;
#[cfg(test)]
mod tests;

pub use buffer::CaptureBuffer;
pub use interval::{resolve_interval, MAX_INTERVAL_MS};
pub use state::{FetchGuard, FetchTicket, SessionState, Status};

use crate::error::{AcquisitionError, ExportError, TransformError};
use crate::frame::CapturedFrame;
use crate::source::FrameRequest;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Work the loop must carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch a frame with this ticket
    Fetch(FetchTicket),
    /// Start the recording timer at this period; first tick one period from now
    ArmRecordingTimer(Duration),
    DisarmRecordingTimer,
    /// Export the capture buffer
    Export,
    /// Return to Idle after the status-display delay, if this export is still current
    ScheduleSettle { generation: u64 },
}

/// How a fetch ended, as reported back to the session
#[derive(Debug)]
pub enum FetchResult {
    /// Preview-only fetch succeeded
    Previewed,
    /// Recording fetch succeeded and produced a still
    Captured(CapturedFrame),
    AcquisitionFailed(AcquisitionError),
    TransformFailed(TransformError),
}

/// What the session did with a completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDisposition {
    Previewed,
    /// Appended; carries the new buffer length
    Appended(usize),
    /// Arrived after the recording it belonged to had ended
    Discarded,
    /// Fetch or transform failed
    Failed,
    /// Ticket did not match the fetch in flight
    Stale,
}

/// Read-only view for the presentation shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub status: String,
    pub captured: usize,
    pub interval_control: String,
    pub fetch_in_flight: bool,
}

/// Recording session driven by the acquisition loop
///
/// Every transition runs to completion on `&mut self` and returns the effects
/// the loop has to perform; no I/O happens here.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    status: Status,
    interval_control: String,
    min_interval_ms: u64,
    effective_interval: Option<Duration>,
    buffer: CaptureBuffer,
    fetch: FetchGuard,
    next_frame_id: u64,
    recording_epoch: u64,
    recording_id: Option<Uuid>,
    export_generation: u64,
}

impl Session {
    pub fn new(default_interval_ms: u64, min_interval_ms: u64) -> Self {
        Self {
            state: SessionState::Idle,
            status: Status::Idle,
            interval_control: default_interval_ms.to_string(),
            min_interval_ms,
            effective_interval: None,
            buffer: CaptureBuffer::new(),
            fetch: FetchGuard::Idle,
            next_frame_id: 1,
            recording_epoch: 0,
            recording_id: None,
            export_generation: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn buffer(&self) -> &CaptureBuffer {
        &self.buffer
    }

    pub fn fetch_guard(&self) -> FetchGuard {
        self.fetch
    }

    pub fn interval_control(&self) -> &str {
        &self.interval_control
    }

    /// Interval resolved at the last `start()`
    pub fn effective_interval(&self) -> Option<Duration> {
        self.effective_interval
    }

    pub fn recording_id(&self) -> Option<Uuid> {
        self.recording_id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            status: self.status.to_string(),
            captured: self.buffer.len(),
            interval_control: self.interval_control.clone(),
            fetch_in_flight: self.fetch.is_in_flight(),
        }
    }

    /// Replace the interval control's text; applied at the next `start()`
    pub fn set_interval_control<S: Into<String>>(&mut self, text: S) {
        self.interval_control = text.into();
        debug!("Interval control set to '{}'", self.interval_control);
    }

    /// Nudge the interval control by `delta_ms`
    pub fn adjust_interval_control(&mut self, delta_ms: i64) {
        let current = resolve_interval(&self.interval_control, self.min_interval_ms) as i64;
        let adjusted = current.saturating_add(delta_ms).max(0);
        self.set_interval_control(adjusted.to_string());
    }

    /// Pass the fetch guard, or return `None` when a fetch is already in flight
    pub fn request_frame(&mut self, for_recording: bool) -> Option<FetchTicket> {
        if let FetchGuard::FetchInFlight(current) = self.fetch {
            trace!(
                "Frame request skipped; frame {} still in flight",
                current.request.id
            );
            return None;
        }

        let ticket = FetchTicket {
            request: FrameRequest::new(self.next_frame_id),
            recording_epoch: for_recording.then_some(self.recording_epoch),
        };
        self.next_frame_id += 1;
        self.fetch = FetchGuard::FetchInFlight(ticket);
        trace!(
            "Frame {} dispatched (recording: {})",
            ticket.request.id,
            for_recording
        );
        Some(ticket)
    }

    /// Close out a fetch; always releases the guard for the matching ticket
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: FetchResult) -> FetchDisposition {
        match self.fetch {
            FetchGuard::FetchInFlight(current) if current == ticket => {
                self.fetch = FetchGuard::Idle;
            }
            _ => {
                warn!(
                    "Ignoring completion for frame {} that is not in flight",
                    ticket.request.id
                );
                return FetchDisposition::Stale;
            }
        }

        match result {
            FetchResult::Previewed => FetchDisposition::Previewed,
            FetchResult::Captured(frame) => {
                let current_recording = self.state == SessionState::Recording
                    && ticket.recording_epoch == Some(self.recording_epoch);
                if !current_recording {
                    debug!(
                        "Discarding frame {} captured after recording stopped",
                        ticket.request.id
                    );
                    return FetchDisposition::Discarded;
                }

                let count = self.buffer.push(frame);
                debug!("Captured frame {} ({} in buffer)", ticket.request.id, count);
                FetchDisposition::Appended(count)
            }
            FetchResult::AcquisitionFailed(e) => {
                warn!("Frame {} dropped: {}", ticket.request.id, e);
                self.status = Status::CameraError;
                FetchDisposition::Failed
            }
            FetchResult::TransformFailed(e) => {
                warn!("Frame {} dropped: {}", ticket.request.id, e);
                self.status = Status::CameraError;
                FetchDisposition::Failed
            }
        }
    }

    /// Begin recording; a no-op while already recording
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state == SessionState::Recording {
            debug!("Start ignored; already recording");
            return Vec::new();
        }

        let cleared = self.buffer.clear();
        if cleared > 0 {
            debug!("Cleared {} frames left from a previous session", cleared);
        }

        let interval_ms = resolve_interval(&self.interval_control, self.min_interval_ms);
        self.interval_control = interval_ms.to_string();
        let interval = Duration::from_millis(interval_ms);
        self.effective_interval = Some(interval);

        self.recording_epoch += 1;
        let recording_id = Uuid::new_v4();
        self.recording_id = Some(recording_id);
        self.state = SessionState::Recording;
        self.status = Status::Recording;
        info!(
            "Recording {} started at {} ms interval",
            recording_id, interval_ms
        );

        let mut effects = Vec::with_capacity(2);
        if let Some(ticket) = self.request_frame(true) {
            effects.push(Effect::Fetch(ticket));
        }
        effects.push(Effect::ArmRecordingTimer(interval));
        effects
    }

    /// Stop recording; a no-op unless recording
    pub fn stop(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Recording {
            debug!("Stop ignored; not recording");
            return Vec::new();
        }

        let mut effects = vec![Effect::DisarmRecordingTimer];
        if self.buffer.is_empty() {
            info!("Recording stopped with no frames; nothing to export");
            self.state = SessionState::Idle;
            self.status = Status::Idle;
        } else {
            info!(
                "Recording stopped with {} frames ({} bytes); exporting",
                self.buffer.len(),
                self.buffer.total_bytes()
            );
            self.state = SessionState::Exporting;
            self.status = Status::PreparingArchive;
            effects.push(Effect::Export);
        }
        effects
    }

    /// Record the export outcome; the buffer is emptied either way
    pub fn finish_export<T>(&mut self, result: &Result<T, ExportError>) -> Vec<Effect> {
        let cleared = self.buffer.clear();
        self.status = match result {
            Ok(_) => Status::DownloadReady,
            Err(e) => Status::ExportFailed(e.to_string()),
        };
        debug!("Export finished; {} frames released", cleared);

        self.export_generation += 1;
        vec![Effect::ScheduleSettle {
            generation: self.export_generation,
        }]
    }

    /// Return to Idle once the export result has been displayed
    pub fn settle(&mut self, generation: u64) -> bool {
        if self.state != SessionState::Exporting || generation != self.export_generation {
            trace!("Stale settle {} ignored", generation);
            return false;
        }
        self.state = SessionState::Idle;
        self.status = Status::Idle;
        true
    }
}
