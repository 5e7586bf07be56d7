use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::job::Recording;
use crate::models::metadata::RecordingMetadata;
use crate::models::track::TagDecision;

/// Upstream API that owns recordings and their processing state.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Lease the next recording of `recording_type` in `state`, if any.
    async fn lease_next_job(&self, recording_type: &str, state: &str) -> Result<Option<Recording>, ApiError>;

    /// Report metadata; `complete` ends processing for the recording.
    async fn report_metadata(
        &self,
        recording: &Recording,
        metadata: &RecordingMetadata,
        complete: bool,
    ) -> Result<(), ApiError>;

    /// Attach the automatic tag to the recording.
    async fn report_tag(&self, recording: &Recording, tag: &TagDecision) -> Result<(), ApiError>;

    /// Mark processing finished and point the recording at its derived file.
    async fn report_completion(
        &self,
        recording: &Recording,
        new_key: &str,
        content_type: &str,
        metadata: Value,
    ) -> Result<(), ApiError>;
}

/// HTTP client for the file-processing endpoints.
pub struct ApiClient {
    http: Client,
    file_url: String,
}

#[derive(Deserialize)]
struct NextJobResponse {
    recording: Recording,
}

impl ApiClient {
    pub fn new(api_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(concat!("thermal-processing/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            file_url: format!("{}/api/fileProcessing", api_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ProcessingApi for ApiClient {
    async fn lease_next_job(&self, recording_type: &str, state: &str) -> Result<Option<Recording>, ApiError> {
        let response = self
            .http
            .get(&self.file_url)
            .query(&[("type", recording_type), ("state", state)])
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body: NextJobResponse = check_status(response).await?.json().await?;
        Ok(Some(body.recording))
    }

    async fn report_metadata(
        &self,
        recording: &Recording,
        metadata: &RecordingMetadata,
        complete: bool,
    ) -> Result<(), ApiError> {
        let form = [
            ("id", recording.id.to_string()),
            ("jobKey", recording.job_key.clone()),
            ("metadata", serde_json::to_string(metadata)?),
            ("complete", complete.to_string()),
        ];

        let response = self
            .http
            .post(format!("{}/metadata", self.file_url))
            .form(&form)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn report_tag(&self, recording: &Recording, tag: &TagDecision) -> Result<(), ApiError> {
        let tag = json!({
            "animal": tag.label,
            "confidence": tag.confidence,
            "automatic": true,
        });
        let form = [
            ("recordingId", recording.id.to_string()),
            ("tag", tag.to_string()),
        ];

        let response = self
            .http
            .post(format!("{}/tags", self.file_url))
            .form(&form)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn report_completion(
        &self,
        recording: &Recording,
        new_key: &str,
        content_type: &str,
        metadata: Value,
    ) -> Result<(), ApiError> {
        let mut field_updates = match metadata {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => return Err(ApiError::InvalidMetadata(other.to_string())),
        };
        field_updates.insert("fileMimeType".to_string(), Value::from(content_type));

        let result = json!({ "fieldUpdates": field_updates });
        let form = [
            ("id", recording.id.to_string()),
            ("jobKey", recording.job_key.clone()),
            ("success", "true".to_string()),
            ("complete", "true".to_string()),
            ("newProcessedFileKey", new_key.to_string()),
            ("result", result.to_string()),
        ];

        let response = self.http.put(&self.file_url).form(&form).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        url,
        body,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("Failed to encode request payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Completion metadata must be a JSON object, got {0}")]
    InvalidMetadata(String),
}
