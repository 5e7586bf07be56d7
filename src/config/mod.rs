use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the processing API (e.g., "http://localhost:1080")
    pub api_url: String,

    /// Object storage bucket holding recordings
    pub s3_bucket: String,

    /// Object storage endpoint URL
    pub s3_endpoint: String,

    /// Signing region for the storage endpoint
    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// Storage access key ID
    pub s3_access_key: String,

    /// Storage secret access key
    pub s3_secret_key: String,

    /// Whether recordings are classified after their metadata is reported
    #[serde(default = "default_classify")]
    pub classify: bool,

    /// Classifier command template; `{source_dir}`, `{output_dir}` and
    /// `{source}` are substituted per recording
    #[serde(default)]
    pub classify_command: String,

    /// Working directory the classifier runs in
    #[serde(default = "default_classify_command_dir")]
    pub classify_command_dir: PathBuf,

    /// Kill the classifier after this many seconds. Unbounded when unset.
    #[serde(default)]
    pub classify_timeout_secs: Option<u64>,

    /// Sleep between polls
    #[serde(default = "default_no_recordings_wait_secs")]
    pub no_recordings_wait_secs: u64,

    /// Recording frame rate (frames per second)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Minimum confidence for a label to become the recording tag
    #[serde(default = "default_min_track_confidence")]
    pub min_track_confidence: f64,

    /// Parent directory for per-recording working directories
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Prometheus scrape listener (e.g., "0.0.0.0:9000"). Disabled when unset.
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_classify() -> bool {
    true
}

fn default_classify_command_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_no_recordings_wait_secs() -> u64 {
    10
}

fn default_frame_rate() -> u32 {
    9
}

fn default_min_track_confidence() -> f64 {
    0.85
}

impl AppConfig {
    /// Load from the environment (and `.env`, if present) and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classify && self.classify_command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "CLASSIFY_COMMAND is required when CLASSIFY is enabled".to_string(),
            ));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("FRAME_RATE must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_track_confidence) {
            return Err(ConfigError::Invalid(
                "MIN_TRACK_CONFIDENCE must be between 0 and 1".to_string(),
            ));
        }
        if self.no_recordings_wait_secs == 0 {
            return Err(ConfigError::Invalid(
                "NO_RECORDINGS_WAIT_SECS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.no_recordings_wait_secs)
    }

    pub fn classify_timeout(&self) -> Option<Duration> {
        self.classify_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
