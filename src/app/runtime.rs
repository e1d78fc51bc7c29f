use super::{ShutdownReason, TmCaptureOrchestrator};
use crate::error::{EventBusError, Result, TmCaptureError};
use crate::events::{CaptureEvent, EventFilter, EventReceiver};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

type SharedShutdown = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

async fn request_shutdown(sender: &SharedShutdown, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}

impl TmCaptureOrchestrator {
    /// Run until a signal or the quit key, then shut down; returns the exit code
    pub async fn run(&mut self) -> Result<i32> {
        info!("tmcapture is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| TmCaptureError::system("Shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| TmCaptureError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(Arc::clone(&shutdown_sender));
        self.watch_for_quit(shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| TmCaptureError::system("Shutdown channel closed unexpectedly"))?;
        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;
        info!("tmcapture shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: SharedShutdown) {
        // SIGTERM - Unix only
        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            let cancel = self.cancellation_token.clone();
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        request_shutdown(&sender, ShutdownReason::Signal("SIGTERM".to_string())).await;
                    }
                }
            });
        }

        // SIGINT (Ctrl+C)
        let cancel = self.cancellation_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                Ok(()) = signal::ctrl_c() => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    request_shutdown(&shutdown_sender, ShutdownReason::Signal("SIGINT".to_string())).await;
                }
            }
        });
    }

    /// Turn a `ShutdownRequested` event (quit key) into a shutdown
    fn watch_for_quit(&self, shutdown_sender: SharedShutdown) {
        let mut events = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "quit_watcher".to_string(),
        );
        let cancel = self.cancellation_token.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = events.recv() => event,
                };
                match event {
                    Ok(CaptureEvent::ShutdownRequested { reason }) => {
                        request_shutdown(&shutdown_sender, ShutdownReason::UserRequest(reason))
                            .await;
                        return;
                    }
                    Ok(_) => {}
                    Err(EventBusError::Lagged { skipped }) => {
                        debug!("Quit watcher caught up after {} events", skipped);
                    }
                    Err(e) => {
                        debug!("Quit watcher stopped: {}", e);
                        return;
                    }
                }
            }
        });
    }
}
