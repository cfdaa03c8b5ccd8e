use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from spawning the capture/transcode process pair.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to spawn capture process `{bin}`: {source}")]
    CaptureSpawn { bin: String, source: io::Error },
    #[error("failed to spawn transcode process `{bin}`: {source}")]
    TranscodeSpawn { bin: String, source: io::Error },
}

/// Errors from the archive segment writer.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to open segment {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to append to segment {path:?}: {source}")]
    Append { path: PathBuf, source: io::Error },
    #[error("failed to finalize segment {path:?}: {source}")]
    Finalize { path: PathBuf, source: io::Error },
}
