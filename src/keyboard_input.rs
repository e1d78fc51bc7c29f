use crate::acquisition::Command;
use crate::error::Result;
use crate::events::{CaptureEvent, EventBus};
use crate::session::SessionSnapshot;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Step applied by the `+` and `-` keys
pub const INTERVAL_STEP_MS: i64 = 100;

/// What a key press asks for
#[derive(Debug)]
pub enum KeyAction {
    Send(Command),
    Quit,
}

/// Map a key to its action; unmapped keys return `None`
pub fn action_for_key(code: KeyCode) -> Option<KeyAction> {
    match code {
        KeyCode::Char('r') | KeyCode::Char('R') => Some(KeyAction::Send(Command::Start)),
        KeyCode::Char('s') | KeyCode::Char('S') => Some(KeyAction::Send(Command::Stop)),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            Some(KeyAction::Send(Command::AdjustInterval(INTERVAL_STEP_MS)))
        }
        KeyCode::Char('-') | KeyCode::Char('_') => {
            Some(KeyAction::Send(Command::AdjustInterval(-INTERVAL_STEP_MS)))
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        _ => None,
    }
}

/// One-line rendering of the session for the terminal
pub fn status_line(snapshot: &SessionSnapshot) -> String {
    format!(
        "[{}] {} | captured: {} | interval: {} ms",
        snapshot.state, snapshot.status, snapshot.captured, snapshot.interval_control
    )
}

/// Terminal controls for the capture session
pub struct KeyboardInputHandler {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(
        commands: mpsc::Sender<Command>,
        snapshots: watch::Receiver<SessionSnapshot>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            commands,
            snapshots,
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input and redrawing the status line
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input handler - r: record, s: stop, +/-: interval, q: quit");

        self.spawn_status_line();

        let commands = self.commands.clone();
        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match action_for_key(key_event.code) {
                            Some(KeyAction::Send(command)) => {
                                debug!("Key {:?} -> {:?}", key_event.code, command);
                                if commands.blocking_send(command).is_err() {
                                    warn!("Acquisition loop is gone; ignoring key");
                                }
                            }
                            Some(KeyAction::Quit) => {
                                info!("Quit key pressed - requesting shutdown");
                                event_bus.emit(CaptureEvent::ShutdownRequested {
                                    reason: "User requested via keyboard".to_string(),
                                });
                                break;
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    fn spawn_status_line(&self) {
        let mut snapshots = self.snapshots.clone();
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                let line = status_line(&snapshots.borrow_and_update());
                let mut stdout = std::io::stdout();
                let _ = write!(stdout, "\r\x1b[2K{}", line);
                let _ = stdout.flush();

                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = write!(std::io::stdout(), "\r\n");
        });
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the blocking task a poll cycle to restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}
