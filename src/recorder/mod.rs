//! The streaming/recording core: one capture process feeding one transcode
//! process through a relay that fans the byte stream out to the rolling live
//! output (always) and the segment archive (when enabled), wrapped in a
//! recovery loop that restarts the pipeline after any failure.

pub mod errors;
pub mod janitor;
pub mod job;
pub mod pipeline;
pub mod relay;
pub mod segments;
pub mod state;

pub use errors::{ArchiveError, PipelineError};
pub use job::{RecorderHandle, RecorderJob};
pub use relay::ControlFlags;
