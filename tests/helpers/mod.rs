//! In-memory collaborators and builders for integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use tokio::time::Instant;

use thermal_processing::models::job::Recording;
use thermal_processing::models::metadata::RecordingMetadata;
use thermal_processing::models::track::TagDecision;
use thermal_processing::services::api::{ApiError, ProcessingApi};
use thermal_processing::services::classifier::ClassifierInvoker;
use thermal_processing::services::metadata::MetadataExtractor;
use thermal_processing::services::processor::{JobProcessor, ProcessorOptions};
use thermal_processing::services::storage::{ObjectStore, StorageError};
use thermal_processing::services::tagging::TagAggregator;
use thermal_processing::services::tracks::TrackFormatter;

/// Build a gzip-compressed CPTV recording.
pub fn cptv_bytes(timestamp_micros: u64, preview_secs: u8, frames: usize) -> Vec<u8> {
    let mut raw = b"CPTV\x02".to_vec();
    raw.extend([b'H', 3]);
    raw.extend([8, b'T']);
    raw.extend(timestamp_micros.to_le_bytes());
    raw.extend([1, b'P', preview_secs]);
    raw.extend([7, b'D']);
    raw.extend(b"test-01");

    for i in 0..frames {
        let payload = vec![(i % 251) as u8; 32];
        raw.extend([b'F', 2]);
        raw.extend([4, b'f']);
        raw.extend((payload.len() as u32).to_le_bytes());
        raw.extend([4, b't']);
        raw.extend((i as u32 * 111).to_le_bytes());
        raw.extend(payload);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&raw).unwrap();
    encoder.finish().unwrap()
}

/// Object store backed by a map of keys to bytes.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<Vec<PathBuf>>,
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    fail_uploads: bool,
}

impl FakeStorage {
    /// Every upload is rejected with a 503.
    pub fn failing_uploads(self) -> Self {
        Self {
            fail_uploads: true,
            ..self
        }
    }

    pub fn with_object(self, key: &str, data: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        self
    }

    /// Local paths recordings were downloaded to.
    pub fn downloads(&self) -> Vec<PathBuf> {
        self.downloads.lock().unwrap().clone()
    }

    /// `(key, content_type, bytes)` of every upload.
    pub fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStorage {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let data = self.objects.lock().unwrap().get(key).cloned();
        let data = data.ok_or_else(|| StorageError::Status {
            key: key.to_string(),
            status: 404,
        })?;
        self.downloads.lock().unwrap().push(dest.to_path_buf());
        std::fs::write(dest, data)?;
        Ok(())
    }

    async fn upload(&self, src: &Path, content_type: &str) -> Result<String, StorageError> {
        let data = std::fs::read(src)?;
        if self.fail_uploads {
            return Err(StorageError::Status {
                key: "processed/rejected".to_string(),
                status: 503,
            });
        }
        let mut uploads = self.uploads.lock().unwrap();
        let key = format!("processed/{}", uploads.len() + 1);
        uploads.push((key.clone(), content_type.to_string(), data));
        Ok(key)
    }
}

/// A call the processor made against the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Metadata {
        id: i64,
        complete: bool,
        metadata: Value,
    },
    Tag {
        id: i64,
        tag: TagDecision,
    },
    Completion {
        id: i64,
        new_key: String,
        content_type: String,
        metadata: Value,
    },
}

/// Processing API that hands out queued recordings and records reports.
#[derive(Default)]
pub struct FakeApi {
    jobs: Mutex<VecDeque<Recording>>,
    leases: Mutex<Vec<Instant>>,
    calls: Mutex<Vec<ApiCall>>,
    fail_leases: bool,
    fail_tags: bool,
    fail_completions: bool,
}

impl FakeApi {
    pub fn with_jobs(jobs: impl IntoIterator<Item = Recording>) -> Self {
        Self {
            jobs: Mutex::new(jobs.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn failing_leases() -> Self {
        Self {
            fail_leases: true,
            ..Self::default()
        }
    }

    pub fn rejecting_tags() -> Self {
        Self {
            fail_tags: true,
            ..Self::default()
        }
    }

    pub fn rejecting_completions() -> Self {
        Self {
            fail_completions: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Times at which a lease was requested.
    pub fn leases(&self) -> Vec<Instant> {
        self.leases.lock().unwrap().clone()
    }

    pub fn lease_count(&self) -> usize {
        self.leases.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessingApi for FakeApi {
    async fn lease_next_job(&self, recording_type: &str, state: &str) -> Result<Option<Recording>, ApiError> {
        assert_eq!(recording_type, "thermalRaw");
        assert_eq!(state, "getMetadata");

        self.leases.lock().unwrap().push(Instant::now());
        if self.fail_leases {
            return Err(ApiError::Status {
                status: 502,
                url: "http://api/api/fileProcessing".to_string(),
                body: "bad gateway".to_string(),
            });
        }
        Ok(self.jobs.lock().unwrap().pop_front())
    }

    async fn report_metadata(
        &self,
        recording: &Recording,
        metadata: &RecordingMetadata,
        complete: bool,
    ) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(ApiCall::Metadata {
            id: recording.id,
            complete,
            metadata: serde_json::to_value(metadata)?,
        });
        Ok(())
    }

    async fn report_tag(&self, recording: &Recording, tag: &TagDecision) -> Result<(), ApiError> {
        if self.fail_tags {
            return Err(rejected("/api/fileProcessing/tags"));
        }
        self.calls.lock().unwrap().push(ApiCall::Tag {
            id: recording.id,
            tag: tag.clone(),
        });
        Ok(())
    }

    async fn report_completion(
        &self,
        recording: &Recording,
        new_key: &str,
        content_type: &str,
        metadata: Value,
    ) -> Result<(), ApiError> {
        if self.fail_completions {
            return Err(rejected("/api/fileProcessing"));
        }
        self.calls.lock().unwrap().push(ApiCall::Completion {
            id: recording.id,
            new_key: new_key.to_string(),
            content_type: content_type.to_string(),
            metadata,
        });
        Ok(())
    }
}

fn rejected(path: &str) -> ApiError {
    ApiError::Status {
        status: 400,
        url: format!("http://api{path}"),
        body: "rejected".to_string(),
    }
}

/// Classifier stand-in: writes the video artifact and prints `output`.
pub fn classifier_printing(output: &str, work: &Path) -> ClassifierInvoker {
    let template = format!(
        "printf 'video' > {{output_dir}}/recording.mp4 && cat <<'JSON'\n{output}\nJSON"
    );
    ClassifierInvoker::new(template, work)
}

pub fn options(classifier: Option<ClassifierInvoker>, work_root: &Path) -> ProcessorOptions {
    ProcessorOptions {
        classifier,
        extractor: MetadataExtractor::new(9),
        aggregator: TagAggregator::default(),
        formatter: TrackFormatter::new(9),
        work_root: Some(work_root.to_path_buf()),
    }
}

pub fn processor(
    storage: &Arc<FakeStorage>,
    api: &Arc<FakeApi>,
    options: ProcessorOptions,
) -> JobProcessor {
    JobProcessor::new(storage.clone(), api.clone(), options)
}

/// Entries left behind under a working-directory root.
pub fn leftover_entries(root: &Path) -> usize {
    std::fs::read_dir(root).unwrap().count()
}
