//! Recordings and classifier outputs shared by the integration tests
#![allow(dead_code)]

use thermal_processing::models::job::Recording;

/// Timestamp written into fixture recordings (2023-11-14T22:13:20Z).
pub const RECORDING_TIMESTAMP_MICROS: u64 = 1_700_000_000_000_000;

/// A classifier run that found one confident rat plus a false positive.
pub const RAT_AND_FALSE_POSITIVE: &str = r#"{
    "algorithm": {"model_name": "inc3"},
    "tracks": [
        {"label": "rat", "confidence": 0.9, "frame_start": 9, "num_frames": 9,
         "start_time": 1.0, "end_time": 2.0, "clarity": 0.6},
        {"label": "false-positive", "confidence": 0.99, "frame_start": 40, "num_frames": 5}
    ]
}"#;

/// A track whose frame range runs past the end of the frame counter.
pub const FRAME_OVERFLOW: &str =
    r#"{"tracks": [{"label": "rat", "confidence": 0.9, "frame_start": 18446744073709551615, "num_frames": 1}]}"#;

/// A classifier run with no detections.
pub const NO_TRACKS: &str = r#"{"tracks": []}"#;

pub fn recording(id: i64) -> Recording {
    Recording {
        id,
        job_key: format!("job-{id}"),
        raw_file_key: format!("raw/2023/11/14/{id}"),
        processing_state: Some("getMetadata".to_string()),
    }
}
