use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::models::metadata::{AdditionalMetadata, RecordingMetadata};
use crate::services::cptv::{CptvReader, DecodeError};

/// Derives timestamp and duration from a downloaded recording.
#[derive(Debug, Clone, Copy)]
pub struct MetadataExtractor {
    frame_rate: u32,
}

impl MetadataExtractor {
    pub fn new(frame_rate: u32) -> Self {
        Self { frame_rate }
    }

    /// Decode the recording at `path`. Blocking; call from a blocking task.
    pub fn extract(&self, path: &Path) -> Result<RecordingMetadata, DecodeError> {
        let file = File::open(path)?;
        let mut reader = CptvReader::new(BufReader::new(file))?;

        let mut frames: u64 = 0;
        for frame in &mut reader {
            frame?;
            frames += 1;
        }

        let header = reader.header();
        tracing::debug!(
            path = %path.display(),
            frames,
            device = header.device_name.as_deref().unwrap_or("unknown"),
            "Decoded recording"
        );

        let duration = (frames as f64 / f64::from(self.frame_rate)).round() as u64;
        let additional_metadata = header
            .preview_secs
            .filter(|secs| *secs > 0)
            .map(|preview_secs| AdditionalMetadata { preview_secs });

        Ok(RecordingMetadata {
            recording_date_time: header.timestamp,
            duration,
            additional_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_recording(path: &Path, preview: u8, frames: usize) {
        let mut raw = b"CPTV\x02H".to_vec();
        raw.push(2);
        raw.extend([8, b'T']);
        raw.extend(1_650_000_000_000_000u64.to_le_bytes());
        raw.extend([1, b'P', preview]);
        for _ in 0..frames {
            raw.extend([b'F', 1, 4, b'f']);
            raw.extend(2u32.to_le_bytes());
            raw.extend([0xAA, 0xBB]);
        }

        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::fast());
        encoder.write_all(&raw).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn duration_rounds_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.cptv");
        write_recording(&path, 0, 95);

        let metadata = MetadataExtractor::new(9).extract(&path).unwrap();
        // 95 / 9 = 10.56
        assert_eq!(metadata.duration, 11);
        assert_eq!(metadata.recording_date_time.timestamp(), 1_650_000_000);
        assert_eq!(metadata.additional_metadata, None);
    }

    #[test]
    fn preview_seconds_reported_when_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.cptv");
        write_recording(&path, 4, 40);

        let metadata = MetadataExtractor::new(9).extract(&path).unwrap();
        assert_eq!(metadata.duration, 4);
        assert_eq!(metadata.preview_secs(), Some(4));
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.cptv");
        std::fs::write(&path, b"definitely not a recording").unwrap();

        assert!(MetadataExtractor::new(9).extract(&path).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = MetadataExtractor::new(9).extract(&dir.path().join("absent.cptv"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }
}
