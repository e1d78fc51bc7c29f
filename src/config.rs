use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TmCaptureConfig {
    pub source: SourceConfig,
    pub acquisition: AcquisitionConfig,
    pub export: ExportConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Base URL of the camera board, without the `/capture` path
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AcquisitionConfig {
    /// Period of the preview timer in milliseconds
    #[serde(default = "default_preview_interval_ms")]
    pub preview_interval_ms: u64,

    /// Initial value of the interval control in milliseconds
    #[serde(default = "default_interval_ms")]
    pub default_interval_ms: u64,

    /// Lowest recording interval accepted; smaller requests are raised to it
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Capacity of the controller command channel
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    /// Directory archives are saved into
    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Delay before the transient download resource is released
    #[serde(default = "default_release_delay_ms")]
    pub release_delay_ms: u64,

    /// How long the export result stays on the status line before returning to Idle
    #[serde(default = "default_status_reset_ms")]
    pub status_reset_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PreviewConfig {
    /// Optional file the latest preview frame is mirrored to
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl AcquisitionConfig {
    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms)
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ExportConfig {
    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }

    pub fn status_reset(&self) -> Duration {
        Duration::from_millis(self.status_reset_ms)
    }
}

impl TmCaptureConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("tmcapture.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("source.base_url", default_base_url())?
            .set_default("source.request_timeout_ms", default_request_timeout_ms())?
            .set_default(
                "acquisition.preview_interval_ms",
                default_preview_interval_ms(),
            )?
            .set_default("acquisition.default_interval_ms", default_interval_ms())?
            .set_default("acquisition.min_interval_ms", default_min_interval_ms())?
            .set_default(
                "acquisition.command_capacity",
                default_command_capacity() as i64,
            )?
            .set_default("export.download_dir", default_download_dir())?
            .set_default("export.release_delay_ms", default_release_delay_ms())?
            .set_default("export.status_reset_ms", default_status_reset_ms())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // TMCAPTURE_SOURCE__BASE_URL, TMCAPTURE_EXPORT__DOWNLOAD_DIR, ...
            .add_source(
                Environment::with_prefix("TMCAPTURE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: TmCaptureConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.source.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Message(
                "Source base_url must not be empty".to_string(),
            ));
        }

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "Source base_url must start with http:// or https:// (got '{}')",
                base_url
            )));
        }

        if self.source.request_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Source request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.acquisition.preview_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Acquisition preview_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.acquisition.min_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Acquisition min_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.acquisition.command_capacity == 0 {
            return Err(ConfigError::Message(
                "Acquisition command_capacity must be greater than 0".to_string(),
            ));
        }

        if self.export.download_dir.trim().is_empty() {
            return Err(ConfigError::Message(
                "Export download_dir must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for TmCaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                base_url: default_base_url(),
                request_timeout_ms: default_request_timeout_ms(),
            },
            acquisition: AcquisitionConfig {
                preview_interval_ms: default_preview_interval_ms(),
                default_interval_ms: default_interval_ms(),
                min_interval_ms: default_min_interval_ms(),
                command_capacity: default_command_capacity(),
            },
            export: ExportConfig {
                download_dir: default_download_dir(),
                release_delay_ms: default_release_delay_ms(),
                status_reset_ms: default_status_reset_ms(),
            },
            preview: PreviewConfig::default(),
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://192.168.4.1".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_preview_interval_ms() -> u64 {
    1300
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_min_interval_ms() -> u64 {
    200
}
fn default_command_capacity() -> usize {
    64
}

fn default_download_dir() -> String {
    "./downloads".to_string()
}
fn default_release_delay_ms() -> u64 {
    1000
}
fn default_status_reset_ms() -> u64 {
    1200
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TmCaptureConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.acquisition.preview_interval(), Duration::from_millis(1300));
        assert_eq!(config.acquisition.min_interval_ms, 200);
        assert_eq!(config.export.status_reset(), Duration::from_millis(1200));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[source]
base_url = "http://10.0.0.7"

[acquisition]
default_interval_ms = 500

[export]
download_dir = "/tmp/tm"
"#
        )
        .unwrap();

        let config = TmCaptureConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.source.base_url, "http://10.0.0.7");
        assert_eq!(config.source.request_timeout_ms, 5000);
        assert_eq!(config.acquisition.default_interval_ms, 500);
        assert_eq!(config.acquisition.preview_interval_ms, 1300);
        assert_eq!(config.export.download_dir, "/tmp/tm");
        assert!(config.preview.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = TmCaptureConfig::load_from_file("/nonexistent/tmcapture.toml").unwrap();
        assert_eq!(config.source.base_url, "http://192.168.4.1");
        assert_eq!(config.export.release_delay_ms, 1000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = TmCaptureConfig::default();

        config.source.base_url = "192.168.4.1".to_string();
        assert!(config.validate().is_err());
        config.source.base_url = "http://192.168.4.1".to_string();

        // Below-floor intervals are clamped when recording starts
        config.acquisition.default_interval_ms = 50;
        assert!(config.validate().is_ok());
        config.acquisition.default_interval_ms = 1000;

        config.acquisition.preview_interval_ms = 0;
        assert!(config.validate().is_err());
        config.acquisition.preview_interval_ms = 1300;

        config.system.event_bus_capacity = 0;
        assert!(config.validate().is_err());
        config.system.event_bus_capacity = 100;

        assert!(config.validate().is_ok());
    }
}
