use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata derived from the raw recording file, in the shape the API expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub recording_date_time: DateTime<Utc>,

    /// Whole seconds.
    pub duration: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_metadata: Option<AdditionalMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalMetadata {
    pub preview_secs: u32,
}

impl RecordingMetadata {
    pub fn preview_secs(&self) -> Option<u32> {
        self.additional_metadata.as_ref().map(|m| m.preview_secs)
    }
}
