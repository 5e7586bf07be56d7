pub mod job;
pub mod metadata;
pub mod track;
