pub mod acquisition;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod frame;
pub mod keyboard_input;
pub mod preview;
pub mod resource;
pub mod session;
pub mod source;
pub mod transform;

#[cfg(feature = "simulator")]
pub mod simulator;

pub use acquisition::{AcquisitionHandle, AcquisitionLoop, Command};
pub use app::{ComponentState, ShutdownReason, TmCaptureOrchestrator};
pub use config::TmCaptureConfig;
pub use error::{Result, TmCaptureError};
pub use events::{CaptureEvent, EventBus, EventFilter, EventReceiver};
pub use export::{ArchiveExporter, DirectoryDownload, DownloadSurface, ExportReceipt};
pub use frame::{CapturedFrame, RawFrame};
pub use preview::{PreviewHandle, PreviewSlot};
pub use resource::{ResourceHandle, ResourceKind, ResourceTracker};
pub use session::{Session, SessionSnapshot, SessionState, Status};
pub use source::{FrameSource, HttpFrameSource, ScriptedFrameSource, ScriptedResponse};
pub use transform::FrameTransform;

#[cfg(feature = "simulator")]
pub use simulator::{DeviceSimulator, RunningSimulator, SimulatorConfig};
