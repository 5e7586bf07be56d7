use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    api::ProcessingApi,
    classifier::ClassifierInvoker,
    metadata::MetadataExtractor,
    poller::PollLoop,
    processor::{JobProcessor, ProcessorOptions},
    storage::ObjectStore,
    tagging::TagAggregator,
    tracks::TrackFormatter,
};

/// Shared collaborators the worker components are built from.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ObjectStore>,
    pub api: Arc<dyn ProcessingApi>,
}

impl AppState {
    pub fn new(storage: impl ObjectStore + 'static, api: impl ProcessingApi + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
            api: Arc::new(api),
        }
    }

    pub fn processor(&self, config: &AppConfig) -> JobProcessor {
        JobProcessor::new(self.storage.clone(), self.api.clone(), processor_options(config))
    }

    pub fn poll_loop(&self, config: &AppConfig) -> PollLoop {
        PollLoop::new(self.api.clone(), self.processor(config), config.poll_interval())
    }
}

/// Build each pipeline component from the loaded configuration.
pub fn processor_options(config: &AppConfig) -> ProcessorOptions {
    let classifier = config.classify.then(|| {
        ClassifierInvoker::new(&config.classify_command, &config.classify_command_dir)
            .with_timeout(config.classify_timeout())
    });

    ProcessorOptions {
        classifier,
        extractor: MetadataExtractor::new(config.frame_rate),
        aggregator: TagAggregator::new(config.min_track_confidence),
        formatter: TrackFormatter::new(config.frame_rate),
        work_root: config.work_dir.clone(),
    }
}
