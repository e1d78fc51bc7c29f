use super::state::{ACQUISITION, KEYBOARD, SIMULATOR};
use super::{ComponentState, TmCaptureOrchestrator};
use crate::acquisition::AcquisitionLoop;
use crate::error::{EventBusError, Result};
use crate::events::{EventFilter, EventReceiver};
use crate::export::{ArchiveExporter, DirectoryDownload};
use crate::keyboard_input::KeyboardInputHandler;
use crate::preview::PreviewSlot;
use crate::source::{FrameSource, HttpFrameSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

impl TmCaptureOrchestrator {
    /// Register components and bring up the simulator when requested
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing tmcapture components");

        {
            let mut states = self.component_states.lock().await;
            states.insert(ACQUISITION.to_string(), ComponentState::Stopped);
            if self.keyboard_enabled {
                states.insert(KEYBOARD.to_string(), ComponentState::Stopped);
            }
            if self.simulate {
                states.insert(SIMULATOR.to_string(), ComponentState::Stopped);
            }
        }

        if self.simulate {
            self.start_simulator().await?;
        }

        info!("All components initialized successfully");
        Ok(())
    }

    #[cfg(feature = "simulator")]
    async fn start_simulator(&mut self) -> Result<()> {
        use crate::simulator::{DeviceSimulator, SimulatorConfig};

        self.set_component_state(SIMULATOR, ComponentState::Starting)
            .await;
        let simulator = DeviceSimulator::start(SimulatorConfig::default())
            .await
            .map_err(|e| {
                error!("Failed to start device simulator: {}", e);
                e
            })?;

        self.config.source.base_url = simulator.base_url();
        info!("Device simulator serving at {}", simulator.base_url());
        self.simulator = Some(simulator);
        self.set_component_state(SIMULATOR, ComponentState::Running)
            .await;
        Ok(())
    }

    #[cfg(not(feature = "simulator"))]
    async fn start_simulator(&mut self) -> Result<()> {
        self.set_component_state(SIMULATOR, ComponentState::Failed)
            .await;
        Err(crate::error::TmCaptureError::component(
            SIMULATOR,
            "this build does not include the device simulator",
        ))
    }

    /// Start the acquisition loop and, if enabled, the terminal controls
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting tmcapture");

        self.set_component_state(ACQUISITION, ComponentState::Starting)
            .await;
        let source: Arc<dyn FrameSource> = match HttpFrameSource::new(&self.config.source) {
            Ok(source) => Arc::new(source),
            Err(e) => {
                self.set_component_state(ACQUISITION, ComponentState::Failed)
                    .await;
                error!("Failed to create frame source: {}", e);
                return Err(e.into());
            }
        };

        let surface = Arc::new(DirectoryDownload::new(&self.config.export.download_dir));
        let exporter = ArchiveExporter::new(
            surface,
            self.tracker.clone(),
            self.config.export.release_delay(),
        );
        let preview = PreviewSlot::new(
            self.tracker.clone(),
            self.config.preview.path.as_ref().map(PathBuf::from),
        );

        let handle = AcquisitionLoop::new(
            &self.config,
            source,
            exporter,
            preview,
            Arc::clone(&self.event_bus),
        )
        .spawn();
        self.set_component_state(ACQUISITION, ComponentState::Running)
            .await;
        info!(
            "Acquisition loop running; archives go to {}",
            self.config.export.download_dir
        );

        if self.keyboard_enabled {
            self.set_component_state(KEYBOARD, ComponentState::Starting)
                .await;
            let keyboard = KeyboardInputHandler::new(
                handle.commands(),
                handle.watch(),
                Arc::clone(&self.event_bus),
            );
            keyboard.start().await.map_err(|e| {
                error!("Failed to start keyboard handler: {}", e);
                e
            })?;
            self.keyboard_handler = Some(keyboard);
            self.set_component_state(KEYBOARD, ComponentState::Running)
                .await;
        }

        if !self.keyboard_enabled {
            self.spawn_event_log();
        }

        self.acquisition = Some(handle);
        info!("tmcapture started successfully");
        Ok(())
    }

    /// Headless mode: print every event to stdout as one JSON line
    fn spawn_event_log(&self) {
        let mut events = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::All,
            "event_log".to_string(),
        );
        let cancel = self.cancellation_token.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!("Failed to serialize event: {}", e),
                    },
                    Err(EventBusError::Lagged { .. }) => {}
                    Err(_) => break,
                }
            }
        });
    }
}
