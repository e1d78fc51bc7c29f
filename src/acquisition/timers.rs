use super::Command;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Send `make()` into the command channel every `period`, first at `start`
///
/// A full channel drops the tick; a closed channel ends the timer.
pub(crate) fn spawn_ticker(
    name: &'static str,
    start: Instant,
    period: Duration,
    make: fn() -> Command,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("{} timer armed at {:?}", name, period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match commands.try_send(make()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            trace!("{} tick dropped; command queue full", name);
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
            }
        }
        debug!("{} timer stopped", name);
    })
}

/// Recording timer that can be armed and disarmed repeatedly
pub(crate) struct RecordingTimer {
    parent: CancellationToken,
    commands: mpsc::Sender<Command>,
    armed: Option<(CancellationToken, JoinHandle<()>)>,
}

impl RecordingTimer {
    pub(crate) fn new(parent: CancellationToken, commands: mpsc::Sender<Command>) -> Self {
        Self {
            parent,
            commands,
            armed: None,
        }
    }

    /// Tick every `period`, the first one `period` from now
    pub(crate) fn arm(&mut self, period: Duration) {
        self.disarm();
        let token = self.parent.child_token();
        let task = spawn_ticker(
            "Recording",
            Instant::now() + period,
            period,
            || Command::RecordingTick,
            self.commands.clone(),
            token.clone(),
        );
        self.armed = Some((token, task));
    }

    pub(crate) fn disarm(&mut self) {
        if let Some((token, _task)) = self.armed.take() {
            token.cancel();
        }
    }
}

impl Drop for RecordingTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
