use super::types::{ComponentState, ShutdownReason};
use crate::acquisition::AcquisitionHandle;
use crate::config::TmCaptureConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::keyboard_input::KeyboardInputHandler;
use crate::resource::ResourceTracker;
#[cfg(feature = "simulator")]
use crate::simulator::RunningSimulator;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// Wires the frame source, acquisition loop and terminal shell together
pub struct TmCaptureOrchestrator {
    pub(super) config: TmCaptureConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) tracker: ResourceTracker,

    // Components
    pub(super) acquisition: Option<AcquisitionHandle>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,
    pub(super) simulate: bool,
    #[cfg(feature = "simulator")]
    pub(super) simulator: Option<RunningSimulator>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl TmCaptureOrchestrator {
    pub fn new(config: TmCaptureConfig) -> Result<Self> {
        config.validate()?;

        let capacity = config.system.event_bus_capacity;
        let event_bus = if tracing::enabled!(tracing::Level::DEBUG) {
            Arc::new(EventBus::with_debug_logging(capacity))
        } else {
            Arc::new(EventBus::new(capacity))
        };
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            tracker: ResourceTracker::new(),
            acquisition: None,
            keyboard_handler: None,
            keyboard_enabled: true,
            simulate: false,
            #[cfg(feature = "simulator")]
            simulator: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the terminal controls
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Serve frames from the built-in device simulator instead of real hardware
    pub fn set_simulate(&mut self, enabled: bool) {
        self.simulate = enabled;
    }

    pub fn config(&self) -> &TmCaptureConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn acquisition(&self) -> Option<&AcquisitionHandle> {
        self.acquisition.as_ref()
    }
}
