use serde::{Deserialize, Serialize};
use strum::Display;

/// Recording type leased by this worker.
pub const RECORDING_TYPE: &str = "thermalRaw";

/// Processing state a recording must be in to be leased.
pub const REQUIRED_STATE: &str = "getMetadata";

/// A recording leased from the processing API.
///
/// This is only a working copy: the authoritative record lives upstream and
/// is discarded once the job has been reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: i64,
    pub job_key: String,
    pub raw_file_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_state: Option<String>,
}

/// Stages a single recording passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Leased,
    Downloaded,
    MetadataReported,
    Classified,
    TagReported,
    Uploaded,
    Completed,
    Failed,
}
