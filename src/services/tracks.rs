use crate::models::track::{FormattedTrack, Track};

/// Classifier fields superseded by the computed `start_s`/`end_s`.
const SUPERSEDED_FIELDS: &[&str] = &["start_time", "end_time"];

/// Converts frame-indexed tracks into the time-based form reported upstream.
#[derive(Debug, Clone, Copy)]
pub struct TrackFormatter {
    frame_rate: u32,
}

impl TrackFormatter {
    pub fn new(frame_rate: u32) -> Self {
        Self { frame_rate }
    }

    pub fn format(&self, tracks: &[Track]) -> Vec<FormattedTrack> {
        tracks.iter().map(|track| self.format_track(track)).collect()
    }

    fn format_track(&self, track: &Track) -> FormattedTrack {
        let last_frame = track
            .frame_start
            .saturating_add(track.num_frames.saturating_sub(1));

        let mut extra = track.extra.clone();
        for field in SUPERSEDED_FIELDS {
            extra.remove(*field);
        }

        FormattedTrack {
            label: track.label.clone(),
            confidence: track.confidence,
            start_s: self.seconds(track.frame_start),
            end_s: self.seconds(last_frame),
            extra,
        }
    }

    fn seconds(&self, frame: u64) -> f64 {
        round_tenths(frame as f64 / f64::from(self.frame_rate))
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
