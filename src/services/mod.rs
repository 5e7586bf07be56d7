pub mod api;
pub mod classifier;
pub mod cptv;
pub mod metadata;
pub mod poller;
pub mod processor;
pub mod storage;
pub mod tagging;
pub mod tracks;
