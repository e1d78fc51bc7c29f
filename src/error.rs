use thiserror::Error;

#[derive(Error, Debug)]
pub enum TmCaptureError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Simulator error: {0}")]
    Simulator(#[from] SimulatorError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl TmCaptureError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures talking to the camera endpoint
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Camera answered {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Camera returned an empty frame")]
    EmptyFrame,

    #[error("Frame source unavailable: {details}")]
    Unavailable { details: String },
}

/// Failures turning a raw frame into a captured still
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to decode frame: {details}")]
    Decode { details: String },

    #[error("Failed to encode frame: {details}")]
    Encode { details: String },

    #[error("Transform worker failed: {details}")]
    Worker { details: String },
}

/// Failures building or delivering the archive
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Archive support not available in this build")]
    ArchiverUnavailable,

    #[error("Nothing to download")]
    EmptyBuffer,

    #[error("Failed to build archive: {details}")]
    Archive { details: String },

    #[error("Failed to save {filename}: {source}")]
    Delivery {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Failed to bind simulator to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Simulator stopped: {details}")]
    Stopped { details: String },
}

pub type Result<T> = std::result::Result<T, TmCaptureError>;
