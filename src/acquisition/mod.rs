mod timers;

use crate::config::TmCaptureConfig;
use crate::error::{AcquisitionError, Result, TmCaptureError, TransformError};
use crate::events::{CaptureEvent, EventBus};
use crate::export::ArchiveExporter;
use crate::frame::{CapturedFrame, RawFrame};
use crate::preview::PreviewSlot;
use crate::session::{
    Effect, FetchDisposition, FetchResult, FetchTicket, Session, SessionSnapshot, SessionState,
};
use crate::source::FrameSource;
use crate::transform::FrameTransform;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use timers::{spawn_ticker, RecordingTimer};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything the controller task reacts to
#[derive(Debug)]
pub enum Command {
    PreviewTick,
    RecordingTick,
    Start,
    Stop,
    /// Replace the interval control's text
    SetInterval(String),
    /// Nudge the interval control by this many milliseconds
    AdjustInterval(i64),
    /// A fetch worker finished
    FetchCompleted {
        ticket: FetchTicket,
        raw: std::result::Result<RawFrame, AcquisitionError>,
        /// Present only for recording fetches whose payload arrived
        captured: Option<std::result::Result<CapturedFrame, TransformError>>,
    },
    /// Status-display delay after an export elapsed
    Settle { generation: u64 },
    Shutdown,
}

/// Acquisition loop ready to be spawned
pub struct AcquisitionLoop {
    session: Session,
    preview_interval: Duration,
    status_reset: Duration,
    command_capacity: usize,
    source: Arc<dyn FrameSource>,
    transform: FrameTransform,
    exporter: ArchiveExporter,
    preview: PreviewSlot,
    event_bus: Arc<EventBus>,
}

impl AcquisitionLoop {
    pub fn new(
        config: &TmCaptureConfig,
        source: Arc<dyn FrameSource>,
        exporter: ArchiveExporter,
        preview: PreviewSlot,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            session: Session::new(
                config.acquisition.default_interval_ms,
                config.acquisition.min_interval_ms,
            ),
            preview_interval: config.acquisition.preview_interval(),
            status_reset: config.export.status_reset(),
            command_capacity: config.acquisition.command_capacity.max(1),
            source,
            transform: FrameTransform::new(),
            exporter,
            preview,
            event_bus,
        }
    }

    /// Start the controller task and the preview timer
    pub fn spawn(self) -> AcquisitionHandle {
        let (commands_tx, commands_rx) = mpsc::channel(self.command_capacity);
        let snapshot = self.session.snapshot();
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());
        let cancel = CancellationToken::new();

        info!(
            "Starting acquisition loop against {} (preview every {:?})",
            self.source.describe(),
            self.preview_interval
        );

        let preview_timer = spawn_ticker(
            "Preview",
            Instant::now(),
            self.preview_interval,
            || Command::PreviewTick,
            commands_tx.clone(),
            cancel.child_token(),
        );

        let controller = Controller {
            session: self.session,
            last: snapshot,
            status_reset: self.status_reset,
            source: self.source,
            transform: self.transform,
            exporter: self.exporter,
            preview: self.preview,
            event_bus: self.event_bus,
            commands: commands_tx.clone(),
            recording_timer: RecordingTimer::new(cancel.child_token(), commands_tx.clone()),
            snapshot_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(controller.run(commands_rx, preview_timer));

        AcquisitionHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            cancel,
            task: Some(task),
        }
    }
}

/// Sending side of the loop, held by the presentation shell
pub struct AcquisitionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AcquisitionHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TmCaptureError::component("acquisition", "controller task has exited"))
    }

    pub async fn start(&self) -> Result<()> {
        self.send(Command::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    pub async fn set_interval<S: Into<String>>(&self, text: S) -> Result<()> {
        self.send(Command::SetInterval(text.into())).await
    }

    /// Clone of the command sender for other input surfaces
    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Latest published session snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Ask the controller to stop and wait for it, cancelling after `timeout`
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("Controller already gone before shutdown");
        }

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TmCaptureError::component(
                "acquisition".to_string(),
                format!("controller task failed: {}", e),
            )),
            Err(_) => {
                warn!("Controller did not stop within {:?}; cancelling", timeout);
                self.cancel.cancel();
                let _ = task.await;
                Ok(())
            }
        }
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Controller {
    session: Session,
    last: SessionSnapshot,
    status_reset: Duration,
    source: Arc<dyn FrameSource>,
    transform: FrameTransform,
    exporter: ArchiveExporter,
    preview: PreviewSlot,
    event_bus: Arc<EventBus>,
    commands: mpsc::Sender<Command>,
    recording_timer: RecordingTimer,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    cancel: CancellationToken,
}

impl Controller {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, preview_timer: JoinHandle<()>) {
        loop {
            let command = tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = commands.recv() => command,
            };

            match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => self.handle(command).await,
            }
        }

        self.recording_timer.disarm();
        self.cancel.cancel();
        let _ = preview_timer.await;
        self.preview.clear();
        info!("Acquisition loop stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::PreviewTick => {
                if self.session.state() != SessionState::Recording {
                    if let Some(ticket) = self.session.request_frame(false) {
                        self.dispatch(ticket);
                    }
                }
            }
            Command::RecordingTick => {
                if self.session.state() == SessionState::Recording {
                    if let Some(ticket) = self.session.request_frame(true) {
                        self.dispatch(ticket);
                    }
                }
            }
            Command::Start => {
                let effects = self.session.start();
                if let Some(interval) = self.session.effective_interval().filter(|_| !effects.is_empty()) {
                    self.event_bus.emit(CaptureEvent::IntervalRewritten {
                        interval_ms: interval.as_millis() as u64,
                    });
                }
                self.apply(effects).await;
            }
            Command::Stop => {
                let effects = self.session.stop();
                self.apply(effects).await;
            }
            Command::SetInterval(text) => self.session.set_interval_control(text),
            Command::AdjustInterval(delta) => self.session.adjust_interval_control(delta),
            Command::FetchCompleted {
                ticket,
                raw,
                captured,
            } => self.complete(ticket, raw, captured),
            Command::Settle { generation } => {
                self.session.settle(generation);
            }
            Command::Shutdown => {}
        }
        self.sync();
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut pending: VecDeque<Effect> = effects.into();
        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::Fetch(ticket) => self.dispatch(ticket),
                Effect::ArmRecordingTimer(period) => self.recording_timer.arm(period),
                Effect::DisarmRecordingTimer => self.recording_timer.disarm(),
                Effect::Export => {
                    // Show "Preparing ZIP..." while the archive is built
                    self.sync();
                    let result = self.exporter.export(self.session.buffer().frames()).await;
                    match &result {
                        Ok(receipt) => self.event_bus.emit(CaptureEvent::ArchiveExported {
                            filename: receipt.filename.clone(),
                            entries: receipt.entries,
                            location: receipt.location.clone(),
                        }),
                        Err(e) => error!("Export failed: {}", e),
                    }
                    pending.extend(self.session.finish_export(&result));
                }
                Effect::ScheduleSettle { generation } => {
                    let commands = self.commands.clone();
                    let delay = self.status_reset;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if commands.send(Command::Settle { generation }).await.is_err() {
                            debug!("Settle for export {} after the loop stopped", generation);
                        }
                    });
                }
            }
        }
    }

    /// Run one fetch on a worker; its result comes back as `FetchCompleted`
    fn dispatch(&self, ticket: FetchTicket) {
        let source = Arc::clone(&self.source);
        let transform = self.transform.clone();
        let commands = self.commands.clone();

        tokio::spawn(async move {
            let raw = source.fetch_frame(ticket.request).await;
            let captured = match &raw {
                Ok(frame) if ticket.for_recording() => Some(transform.apply(frame.clone()).await),
                _ => None,
            };

            if commands
                .send(Command::FetchCompleted {
                    ticket,
                    raw,
                    captured,
                })
                .await
                .is_err()
            {
                debug!("Frame {} finished after the loop stopped", ticket.request.id);
            }
        });
    }

    fn complete(
        &mut self,
        ticket: FetchTicket,
        raw: std::result::Result<RawFrame, AcquisitionError>,
        captured: Option<std::result::Result<CapturedFrame, TransformError>>,
    ) {
        let frame_id = ticket.request.id;
        let result = match raw {
            Ok(frame) => {
                let handle = self.preview.replace(frame);
                debug!(
                    "Preview frame {} ({} bytes, {} ms since arrival)",
                    handle.frame().id,
                    handle.frame().len(),
                    handle.frame().age_ms()
                );
                self.event_bus.emit(CaptureEvent::PreviewUpdated {
                    frame_id: handle.frame().id,
                    handle_id: handle.handle_id(),
                    bytes: handle.frame().len(),
                });
                match captured {
                    None => FetchResult::Previewed,
                    Some(Ok(still)) => FetchResult::Captured(still),
                    Some(Err(e)) => FetchResult::TransformFailed(e),
                }
            }
            Err(e) => FetchResult::AcquisitionFailed(e),
        };

        let reason = match &result {
            FetchResult::AcquisitionFailed(e) => Some(e.to_string()),
            FetchResult::TransformFailed(e) => Some(e.to_string()),
            _ => None,
        };

        match self.session.complete_fetch(ticket, result) {
            FetchDisposition::Appended(count) => {
                self.event_bus
                    .emit(CaptureEvent::FrameCaptured { frame_id, count });
            }
            FetchDisposition::Failed => {
                self.event_bus.emit(CaptureEvent::FrameDropped {
                    frame_id,
                    reason: reason.unwrap_or_default(),
                });
            }
            FetchDisposition::Previewed
            | FetchDisposition::Discarded
            | FetchDisposition::Stale => {}
        }
    }

    /// Publish whatever changed since the last published snapshot
    fn sync(&mut self) {
        let current = self.session.snapshot();
        if current == self.last {
            return;
        }

        if current.state != self.last.state {
            info!("Session {} -> {}", self.last.state, current.state);
            self.event_bus.emit(CaptureEvent::SessionStateChanged {
                from: self.last.state,
                to: current.state,
            });
        }
        if current.status != self.last.status {
            self.event_bus.emit(CaptureEvent::StatusChanged {
                status: current.status.clone(),
            });
        }
        if current.captured != self.last.captured {
            self.event_bus.emit(CaptureEvent::CaptureCountChanged {
                count: current.captured,
            });
        }

        self.snapshot_tx.send_replace(current.clone());
        self.last = current;
    }
}
