use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::models::job::{RECORDING_TYPE, REQUIRED_STATE};
use crate::services::api::{ApiError, ProcessingApi};
use crate::services::processor::{JobError, JobProcessor, JobReport};

/// What a single poll iteration did.
#[derive(Debug)]
pub enum PollOutcome {
    Idle,
    Processed(JobReport),
    LeaseFailed(ApiError),
    JobFailed { recording_id: i64, error: JobError },
}

impl PollOutcome {
    fn label(&self) -> &'static str {
        match self {
            PollOutcome::Idle => "idle",
            PollOutcome::Processed(_) => "processed",
            PollOutcome::LeaseFailed(_) => "lease_failed",
            PollOutcome::JobFailed { .. } => "job_failed",
        }
    }
}

/// Leases recordings one at a time and hands them to the processor.
///
/// Failures never end the loop; only the shutdown future does.
pub struct PollLoop {
    api: Arc<dyn ProcessingApi>,
    processor: JobProcessor,
    idle_interval: Duration,
}

impl PollLoop {
    pub fn new(api: Arc<dyn ProcessingApi>, processor: JobProcessor, idle_interval: Duration) -> Self {
        Self {
            api,
            processor,
            idle_interval,
        }
    }

    /// Poll until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(
            idle_interval_secs = self.idle_interval.as_secs(),
            classify = self.processor.classification_enabled(),
            "Worker ready, polling for recordings"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.iterate() => {}
            }
        }

        tracing::info!("Shutdown requested, poll loop stopped");
    }

    /// One lease attempt, the job it yields if any, then the idle sleep.
    async fn iterate(&self) {
        let outcome = self.poll_once().await;
        metrics::counter!("poll_iterations_total", "outcome" => outcome.label()).increment(1);

        match &outcome {
            PollOutcome::Idle => tracing::debug!("No recordings available, sleeping"),
            PollOutcome::Processed(report) => tracing::debug!(
                recording_id = report.recording_id,
                state = %report.state,
                "Iteration complete"
            ),
            PollOutcome::LeaseFailed(e) => {
                tracing::error!(error = %e, "Failed to lease next recording, will retry")
            }
            PollOutcome::JobFailed { recording_id, error } => tracing::debug!(
                recording_id,
                kind = error.kind(),
                error = ?error,
                "Iteration failed, will retry"
            ),
        }

        sleep(self.idle_interval).await;
    }

    /// Lease and process at most one recording.
    pub async fn poll_once(&self) -> PollOutcome {
        let recording = match self.api.lease_next_job(RECORDING_TYPE, REQUIRED_STATE).await {
            Ok(Some(recording)) => recording,
            Ok(None) => return PollOutcome::Idle,
            Err(e) => return PollOutcome::LeaseFailed(e),
        };

        match self.processor.process(&recording).await {
            Ok(report) => PollOutcome::Processed(report),
            Err(error) => PollOutcome::JobFailed {
                recording_id: recording.id,
                error,
            },
        }
    }
}
