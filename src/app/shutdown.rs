use super::state::{ACQUISITION, KEYBOARD};
use super::{ComponentState, TmCaptureOrchestrator};
use crate::error::{Result, TmCaptureError};
use crate::session::SessionState;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const KEYBOARD_STOP_TIMEOUT: Duration = Duration::from_secs(2);
const ACQUISITION_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl TmCaptureOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Err(e) = self.stop_keyboard().await {
            error!("Error stopping keyboard: {}", e);
            exit_code = 1;
        }

        if let Err(e) = self.stop_acquisition().await {
            error!("Error stopping acquisition: {}", e);
            exit_code = 1;
        }

        if let Err(e) = self.stop_simulator().await {
            error!("Error stopping simulator: {}", e);
            exit_code = 1;
        }

        let failed = self.components_in(ComponentState::Failed).await;
        if !failed.is_empty() {
            warn!("Components that failed: {}", failed.join(", "));
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_keyboard(&mut self) -> Result<()> {
        let Some(keyboard) = self.keyboard_handler.take() else {
            return Ok(());
        };

        self.set_component_state(KEYBOARD, ComponentState::Stopping)
            .await;
        match timeout(KEYBOARD_STOP_TIMEOUT, keyboard.stop()).await {
            Ok(result) => {
                let state = if result.is_ok() {
                    ComponentState::Stopped
                } else {
                    ComponentState::Failed
                };
                self.set_component_state(KEYBOARD, state).await;
                result
            }
            Err(_) => {
                self.set_component_state(KEYBOARD, ComponentState::Failed)
                    .await;
                Err(TmCaptureError::component(
                    KEYBOARD,
                    "keyboard handler stop timeout",
                ))
            }
        }
    }

    /// Export any recording in progress, then stop the controller
    async fn stop_acquisition(&mut self) -> Result<()> {
        let Some(mut handle) = self.acquisition.take() else {
            return Ok(());
        };

        self.set_component_state(ACQUISITION, ComponentState::Stopping)
            .await;

        let snapshot = handle.snapshot();
        if snapshot.state == SessionState::Recording {
            info!(
                "Stopping recording with {} frames before exit",
                snapshot.captured
            );
            if let Err(e) = handle.stop().await {
                warn!("Could not stop recording: {}", e);
            }
        }

        let result = handle.shutdown(ACQUISITION_STOP_TIMEOUT).await;
        let state = if result.is_ok() {
            ComponentState::Stopped
        } else {
            ComponentState::Failed
        };
        self.set_component_state(ACQUISITION, state).await;
        result
    }

    #[cfg(feature = "simulator")]
    async fn stop_simulator(&mut self) -> Result<()> {
        use super::state::SIMULATOR;

        let Some(simulator) = self.simulator.take() else {
            return Ok(());
        };

        self.set_component_state(SIMULATOR, ComponentState::Stopping)
            .await;
        info!(
            "Stopping device simulator after {} requests",
            simulator.request_count()
        );
        match simulator.shutdown().await {
            Ok(()) => {
                self.set_component_state(SIMULATOR, ComponentState::Stopped)
                    .await;
                Ok(())
            }
            Err(e) => {
                self.set_component_state(SIMULATOR, ComponentState::Failed)
                    .await;
                Err(e.into())
            }
        }
    }

    #[cfg(not(feature = "simulator"))]
    async fn stop_simulator(&mut self) -> Result<()> {
        Ok(())
    }
}
