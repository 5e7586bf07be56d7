use std::collections::BTreeMap;

use crate::models::track::{TagDecision, Track, FALSE_POSITIVE, UNIDENTIFIED};

/// Confidence a label needs before it is used as the recording tag.
pub const MIN_TRACK_CONFIDENCE: f64 = 0.85;

/// Reduces per-track classifications to a single recording-level tag.
#[derive(Debug, Clone, Copy)]
pub struct TagAggregator {
    min_confidence: f64,
}

impl Default for TagAggregator {
    fn default() -> Self {
        Self::new(MIN_TRACK_CONFIDENCE)
    }
}

impl TagAggregator {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Pick the tag for a recording.
    ///
    /// - No tracks: false-positive.
    /// - Each label is represented by its best track, except false-positive
    ///   which always counts at the threshold.
    /// - False-positive is dropped as soon as any other label is present.
    /// - A single remaining label wins if it meets the threshold.
    /// - Anything else is unidentified.
    pub fn aggregate(&self, tracks: &[Track]) -> TagDecision {
        if tracks.is_empty() {
            return TagDecision::new(FALSE_POSITIVE, self.min_confidence);
        }

        let mut candidates: BTreeMap<&str, f64> = BTreeMap::new();
        for track in tracks {
            let confidence = if track.label == FALSE_POSITIVE {
                self.min_confidence
            } else {
                track.confidence
            };
            candidates
                .entry(track.label.as_str())
                .and_modify(|best| *best = best.max(confidence))
                .or_insert(confidence);
        }

        if candidates.len() == 1 {
            return self.single_candidate(&candidates);
        }

        candidates.remove(FALSE_POSITIVE);

        if candidates.len() == 1 {
            return self.single_candidate(&candidates);
        }

        TagDecision::new(UNIDENTIFIED, self.min_confidence)
    }

    fn single_candidate(&self, candidates: &BTreeMap<&str, f64>) -> TagDecision {
        match candidates.iter().next() {
            Some((label, &confidence)) if confidence >= self.min_confidence => {
                TagDecision::new(*label, confidence)
            }
            _ => TagDecision::new(UNIDENTIFIED, self.min_confidence),
        }
    }
}
