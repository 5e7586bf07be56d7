use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved label meaning "nothing real was detected".
pub const FALSE_POSITIVE: &str = "false-positive";

/// Label used when the classifier output does not support a single answer.
pub const UNIDENTIFIED: &str = "unidentified";

/// One detected object span, as emitted by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Track {
    #[garde(length(min = 1))]
    pub label: String,

    #[garde(range(min = 0.0, max = 1.0))]
    pub confidence: f64,

    #[garde(skip)]
    pub frame_start: u64,

    #[garde(range(min = 1))]
    pub num_frames: u64,

    /// Any other descriptive fields, passed through to the report verbatim.
    #[serde(flatten)]
    #[garde(skip)]
    pub extra: Map<String, Value>,
}

impl Track {
    pub fn new(label: impl Into<String>, confidence: f64, frame_start: u64, num_frames: u64) -> Self {
        Self {
            label: label.into(),
            confidence,
            frame_start,
            num_frames,
            extra: Map::new(),
        }
    }
}

/// Recording-level tag reduced from all tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDecision {
    pub label: String,
    pub confidence: f64,
}

impl TagDecision {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Track as reported upstream, with frame indices converted to seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedTrack {
    pub label: String,
    pub confidence: f64,
    pub start_s: f64,
    pub end_s: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
