//! Single-recording lifecycle.
//!
//! `Leased -> Downloaded -> MetadataReported -> (Classified -> TagReported ->
//! Uploaded -> Completed) | Failed`. The working directory lives exactly as
//! long as one call to [`JobProcessor::process`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tempfile::TempDir;

use crate::models::job::{JobState, Recording};
use crate::models::track::TagDecision;
use crate::services::api::{ApiError, ProcessingApi};
use crate::services::classifier::{ClassifierInvoker, ClassifyError};
use crate::services::cptv::DecodeError;
use crate::services::metadata::MetadataExtractor;
use crate::services::storage::{ObjectStore, StorageError};
use crate::services::tagging::TagAggregator;
use crate::services::tracks::TrackFormatter;

/// Local name of the downloaded raw recording.
pub const DOWNLOAD_FILENAME: &str = "recording.cptv";

/// Extension of the video the classifier leaves next to the raw file.
pub const ARTIFACT_EXTENSION: &str = "mp4";

pub const ARTIFACT_CONTENT_TYPE: &str = "video/mp4";

const WORKDIR_PREFIX: &str = "thermal-";

/// Components and settings a [`JobProcessor`] is built from.
pub struct ProcessorOptions {
    /// `None` disables classification; jobs complete after metadata.
    pub classifier: Option<ClassifierInvoker>,
    pub extractor: MetadataExtractor,
    pub aggregator: TagAggregator,
    pub formatter: TrackFormatter,
    /// Parent for working directories; the system temp dir when `None`.
    pub work_root: Option<PathBuf>,
}

pub struct JobProcessor {
    storage: Arc<dyn ObjectStore>,
    api: Arc<dyn ProcessingApi>,
    options: ProcessorOptions,
}

/// Outcome of a successful pass.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub recording_id: i64,
    pub state: JobState,
    pub tag: Option<TagDecision>,
    pub new_key: Option<String>,
}

/// Tracks the state a recording has reached, logging every transition.
struct JobRun<'a> {
    recording: &'a Recording,
    state: JobState,
}

impl<'a> JobRun<'a> {
    fn leased(recording: &'a Recording) -> Self {
        tracing::info!(
            recording_id = recording.id,
            raw_file_key = %recording.raw_file_key,
            state = %JobState::Leased,
            "Processing recording"
        );
        Self {
            recording,
            state: JobState::Leased,
        }
    }

    fn advance(&mut self, next: JobState) {
        tracing::info!(
            recording_id = self.recording.id,
            from = %self.state,
            state = %next,
            "Recording state changed"
        );
        self.state = next;
    }

    fn fail(&mut self, error: &JobError) {
        tracing::error!(
            recording_id = self.recording.id,
            job_key = %self.recording.job_key,
            last_state = %self.state,
            kind = error.kind(),
            error = %error,
            "Recording processing failed"
        );
        self.state = JobState::Failed;
    }
}

impl JobProcessor {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        api: Arc<dyn ProcessingApi>,
        options: ProcessorOptions,
    ) -> Self {
        Self {
            storage,
            api,
            options,
        }
    }

    pub fn classification_enabled(&self) -> bool {
        self.options.classifier.is_some()
    }

    /// Run one recording through every stage.
    ///
    /// The working directory is removed before this returns, whatever the
    /// outcome.
    pub async fn process(&self, recording: &Recording) -> Result<JobReport, JobError> {
        let started = Instant::now();
        let mut run = JobRun::leased(recording);

        let result = match self.working_directory() {
            Ok(workdir) => {
                let result = self.run_stages(&mut run, workdir.path()).await;
                release(recording, workdir);
                result
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(report) => {
                metrics::counter!("recordings_processed_total").increment(1);
                metrics::histogram!("recording_processing_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    recording_id = recording.id,
                    tag = report.tag.as_ref().map(|t| t.label.as_str()).unwrap_or("-"),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Finished processing"
                );
            }
            Err(e) => {
                metrics::counter!("recordings_failed_total", "kind" => e.kind()).increment(1);
                run.fail(e);
            }
        }
        result
    }

    fn working_directory(&self) -> Result<TempDir, JobError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKDIR_PREFIX);
        let dir = match &self.options.work_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(JobError::WorkingDirectory)
    }

    async fn run_stages(&self, run: &mut JobRun<'_>, workdir: &Path) -> Result<JobReport, JobError> {
        let recording = run.recording;
        let raw_path = workdir.join(DOWNLOAD_FILENAME);

        self.storage
            .download(&recording.raw_file_key, &raw_path)
            .await
            .map_err(JobError::Download)?;
        run.advance(JobState::Downloaded);

        let extractor = self.options.extractor;
        let decode_path = raw_path.clone();
        let metadata = tokio::task::spawn_blocking(move || extractor.extract(&decode_path))
            .await
            .map_err(JobError::Task)?
            .map_err(JobError::Decode)?;
        tracing::info!(
            recording_id = recording.id,
            recording_date_time = %metadata.recording_date_time,
            duration = metadata.duration,
            "Extracted metadata"
        );

        let classifier = match &self.options.classifier {
            Some(classifier) => classifier,
            None => {
                self.api
                    .report_metadata(recording, &metadata, true)
                    .await
                    .map_err(JobError::Api)?;
                run.advance(JobState::MetadataReported);
                run.advance(JobState::Completed);
                return Ok(JobReport {
                    recording_id: recording.id,
                    state: run.state,
                    tag: None,
                    new_key: None,
                });
            }
        };

        self.api
            .report_metadata(recording, &metadata, false)
            .await
            .map_err(JobError::Api)?;
        run.advance(JobState::MetadataReported);

        let tracks = classifier
            .classify(&raw_path, workdir)
            .await
            .map_err(JobError::Classify)?;
        run.advance(JobState::Classified);

        let tag = self.options.aggregator.aggregate(&tracks);
        tracing::info!(
            recording_id = recording.id,
            tracks = tracks.len(),
            tag = %tag.label,
            confidence = tag.confidence,
            "Calculated tag"
        );
        self.api
            .report_tag(recording, &tag)
            .await
            .map_err(JobError::Api)?;
        run.advance(JobState::TagReported);

        let formatted = self.options.formatter.format(&tracks);
        tracing::debug!(recording_id = recording.id, tracks = ?formatted, "Formatted tracks");

        let artifact = raw_path.with_extension(ARTIFACT_EXTENSION);
        if !artifact.is_file() {
            return Err(JobError::MissingArtifact(artifact));
        }
        tracing::info!(recording_id = recording.id, path = %artifact.display(), "Uploading artifact");
        let new_key = self
            .storage
            .upload(&artifact, ARTIFACT_CONTENT_TYPE)
            .await
            .map_err(JobError::Upload)?;
        run.advance(JobState::Uploaded);

        let metadata = json!({ "additionalMetadata": { "tracks": formatted } });
        self.api
            .report_completion(recording, &new_key, ARTIFACT_CONTENT_TYPE, metadata)
            .await
            .map_err(JobError::Api)?;
        run.advance(JobState::Completed);

        Ok(JobReport {
            recording_id: recording.id,
            state: run.state,
            tag: Some(tag),
            new_key: Some(new_key),
        })
    }
}

fn release(recording: &Recording, workdir: TempDir) {
    let path = workdir.path().to_path_buf();
    if let Err(e) = workdir.close() {
        tracing::warn!(
            recording_id = recording.id,
            path = %path.display(),
            error = %e,
            "Failed to remove working directory"
        );
    }
}

/// Everything that can end a recording's pass early.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to create working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),

    #[error("download failed: {0}")]
    Download(#[source] StorageError),

    #[error("failed to decode recording: {0}")]
    Decode(#[source] DecodeError),

    #[error("classification failed: {0}")]
    Classify(#[source] ClassifyError),

    #[error("classifier produced no artifact at {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("upload failed: {0}")]
    Upload(#[source] StorageError),

    #[error("API call failed: {0}")]
    Api(#[source] ApiError),

    #[error("decode task failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}

impl JobError {
    /// Stable identifier for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::WorkingDirectory(_) => "working_directory_error",
            JobError::Download(_) => "download_error",
            JobError::Decode(_) => "decode_error",
            JobError::Classify(e) => e.kind(),
            JobError::MissingArtifact(_) | JobError::Upload(_) => "upload_error",
            JobError::Api(_) => "api_error",
            JobError::Task(_) => "task_error",
        }
    }
}
