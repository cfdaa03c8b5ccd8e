use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::warn;

/// Persistent line-oriented record of failed recording intervals, kept
/// outside the main log stream so operators can tail a single dated file.
pub struct FaultLog {
    path: PathBuf,
}

impl FaultLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one dated line. A failure to write is itself only a warning;
    /// the recorder never stops over its own diagnostics.
    pub fn record(&self, at: DateTime<Local>, detail: &str) {
        if let Err(e) = self.append(at, detail) {
            warn!("Failed to append to fault log {:?}: {}", self.path, e);
        }
    }

    fn append(&self, at: DateTime<Local>, detail: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "Recording failed at {}: {}",
            at.format("%Y-%m-%d_%H-%M-%S"),
            detail
        )
    }
}
