//! Continuous camera capture with rolling HLS live streaming and optional
//! time-sliced archive recording.
//!
//! The recorder owns a pipeline of two external processes: a capture program
//! emitting an H.264 elementary stream and a transcode program maintaining a
//! rolling HLS window for live viewers. A relay thread forks every chunk to
//! the transcode input and, when recording is enabled, to rotating archive
//! segments written through a stage-then-rename pattern. An outer recovery
//! loop restarts the whole pipeline after any failure for as long as the
//! embedding job is alive.
//!
//! Hosts interact through [`RecorderJob::spawn`] and the returned
//! [`RecorderHandle`]: a settable recording flag and a disconnect call.

pub mod config;
pub mod faultlog;
pub mod logging;
pub mod paths;
pub mod recorder;

pub use config::RecorderConfig;
pub use recorder::{RecorderHandle, RecorderJob};
