use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::{data_dir, ensure_dir};

/// Recorder configuration, read once at startup and immutable afterwards.
///
/// Every field has a default so a missing or partial config file still yields
/// a runnable recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory receiving finished archive segments.
    pub save_dir: PathBuf,
    /// Directory the transcode process writes the rolling HLS output to.
    pub live_dir: PathBuf,
    /// Base name of the HLS manifest and its fragment files.
    pub stream_name: String,
    /// Length of one archive segment, in minutes.
    pub segment_minutes: u64,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub vflip: bool,
    /// HLS fragment duration handed to the transcode process, in seconds.
    pub hls_fragment_secs: u32,
    /// Number of fragments the rolling HLS window retains.
    pub hls_window_size: u32,
    /// Whether the transcode process deletes fragments that left the window.
    pub hls_delete_stale: bool,
    /// Capture program; emits an H.264 elementary stream on stdout.
    pub capture_bin: String,
    /// Transcode program; reads the elementary stream on stdin.
    pub transcode_bin: String,
    /// Delay before restarting the pipeline after a failed iteration, seconds.
    pub cooldown_secs: u64,
    /// Grace period before a termination request escalates to kill, seconds.
    pub stop_timeout_secs: u64,
    /// Line-oriented log of failed recording intervals.
    pub fault_log: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            save_dir: data.join("recordings"),
            live_dir: data.join("live"),
            stream_name: "webcam".to_string(),
            segment_minutes: 15,
            width: 1920,
            height: 1080,
            framerate: 30,
            vflip: true,
            hls_fragment_secs: 2,
            hls_window_size: 5,
            hls_delete_stale: true,
            capture_bin: "rpicam-vid".to_string(),
            transcode_bin: "ffmpeg".to_string(),
            cooldown_secs: 5,
            stop_timeout_secs: 10,
            fault_log: data.join("recording_failures.log"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl RecorderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load from `path` when given, falling back to defaults on any failure.
    /// A broken config file must not keep the recorder from starting.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config from {:?}: {}; using defaults", path, e);
                Self::default()
            }
        }
    }

    pub fn segment_duration(&self) -> Duration {
        Duration::from_secs(self.segment_minutes * 60)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.live_dir.join(format!("{}.m3u8", self.stream_name))
    }

    /// Create every directory the recorder writes into. Idempotent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        ensure_dir(&self.save_dir)?;
        ensure_dir(&self.live_dir)?;
        if let Some(parent) = self.fault_log.parent() {
            ensure_dir(parent)?;
        }
        Ok(())
    }
}
