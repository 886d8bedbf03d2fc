//! Data models for the media-analysis pipeline
//!
//! The media record and its embedded analysis state are owned by the document
//! store; retry jobs are the durable counterpart of scheduled retries.

mod analysis;
mod media;
mod retry_job;

pub use analysis::*;
pub use media::*;
pub use retry_job::*;
