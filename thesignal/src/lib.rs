// Library interface for The Signal ingestion pipeline.
// The binary and the integration tests both build on these modules.

pub mod dedup;
pub mod error;
pub mod fetch_job;
pub mod llm;
pub mod model;
pub mod normalize;
pub mod scoring;
pub mod sources;
pub mod storage;
pub mod thumbnails;
