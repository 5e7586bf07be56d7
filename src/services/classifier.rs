use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use garde::Validate;
use serde::Deserialize;
use tokio::process::Command;

use crate::models::track::Track;

/// Runs the external classifier against a downloaded recording.
#[derive(Debug, Clone)]
pub struct ClassifierInvoker {
    command_template: String,
    command_dir: PathBuf,
    timeout: Option<Duration>,
}

/// Expected shape of the classifier's standard output.
#[derive(Debug, Deserialize)]
struct ClassifierOutput {
    #[serde(default)]
    tracks: Option<Vec<Track>>,
}

impl ClassifierInvoker {
    pub fn new(command_template: impl Into<String>, command_dir: impl Into<PathBuf>) -> Self {
        Self {
            command_template: command_template.into(),
            command_dir: command_dir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fill the template's `{source_dir}`, `{output_dir}` and `{source}` placeholders.
    pub fn render_command(&self, source: &Path, output_dir: &Path) -> String {
        let source_dir = source.parent().unwrap_or(output_dir);
        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        self.command_template
            .replace("{source_dir}", &source_dir.to_string_lossy())
            .replace("{output_dir}", &output_dir.to_string_lossy())
            .replace("{source}", &source_name)
    }

    /// Classify `source`, writing derived files into `output_dir`.
    pub async fn classify(&self, source: &Path, output_dir: &Path) -> Result<Vec<Track>, ClassifyError> {
        let command = self.render_command(source, output_dir);
        tracing::info!(command = %command, "Running classifier");

        let mut process = Command::new("sh");
        process
            .arg("-c")
            .arg(&command)
            .current_dir(&self.command_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = process.output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| ClassifyError::Timeout(limit))?,
            None => child.await,
        }
        .map_err(ClassifyError::Spawn)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(ClassifyError::Process {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %stderr.trim_end(), "Classifier diagnostics");
        }

        parse_tracks(&stdout)
    }
}

/// Decode and validate classifier output.
pub fn parse_tracks(output: &str) -> Result<Vec<Track>, ClassifyError> {
    let decoded: ClassifierOutput =
        serde_json::from_str(output).map_err(|source| ClassifyError::Format {
            source,
            output: output.to_string(),
        })?;

    let tracks = decoded.tracks.unwrap_or_default();
    for (index, track) in tracks.iter().enumerate() {
        track.validate().map_err(|report| ClassifyError::Invalid {
            index,
            reason: report.to_string(),
        })?;
        if track.frame_start.checked_add(track.num_frames).is_none() {
            return Err(ClassifyError::Invalid {
                index,
                reason: format!(
                    "frames {}+{} exceed the frame counter range",
                    track.frame_start, track.num_frames
                ),
            });
        }
    }
    Ok(tracks)
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("failed to start classifier: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("classifier exited with status {code:?}: {stderr}")]
    Process { code: Option<i32>, stderr: String },

    #[error("failed to decode classifier output: {source}\n{output}")]
    Format {
        #[source]
        source: serde_json::Error,
        output: String,
    },

    #[error("classifier track {index} is invalid: {reason}")]
    Invalid { index: usize, reason: String },

    #[error("classifier did not finish within {0:?}")]
    Timeout(Duration),
}

impl ClassifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::Spawn(_) | ClassifyError::Process { .. } => "process_error",
            ClassifyError::Format { .. } | ClassifyError::Invalid { .. } => "format_error",
            ClassifyError::Timeout(_) => "timeout_error",
        }
    }
}
