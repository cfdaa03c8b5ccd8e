//! Archive side of the stream fan-out.
//!
//! Chunks are appended to a staging file (`raw_<ts>.h264.tmp`) which is only
//! renamed to its final name (`raw_<ts>.h264`) once the segment is complete.
//! A reader polling the archive directory therefore never observes a
//! partially-written file under the final naming pattern.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use super::errors::ArchiveError;

const ARCHIVE_EXT: &str = "h264";
const STAGING_EXT: &str = "h264.tmp";

/// One archive file currently being written.
struct OpenSegment {
    started_at: DateTime<Local>,
    staging_path: PathBuf,
    final_path: PathBuf,
    file: BufWriter<File>,
    bytes_written: u64,
}

/// Decides whether a chunk is persisted, when the current file rotates, and
/// guarantees readers only ever see fully-written files under final names.
///
/// Owned exclusively by the recorder thread; at most one segment is open at
/// any time.
pub struct SegmentWriter {
    save_dir: PathBuf,
    segment_duration: Duration,
    open: Option<OpenSegment>,
}

impl SegmentWriter {
    pub fn new(save_dir: PathBuf, segment_duration: Duration) -> Self {
        Self {
            save_dir,
            segment_duration,
            open: None,
        }
    }

    pub fn has_open(&self) -> bool {
        self.open.is_some()
    }

    /// Append a chunk to the archive, opening or rotating the segment as the
    /// chunk's timestamp requires. Returns the path of a segment promoted by
    /// rotation, if any.
    pub fn offer(
        &mut self,
        chunk: &[u8],
        now: DateTime<Local>,
    ) -> Result<Option<PathBuf>, ArchiveError> {
        let rotate = match &self.open {
            Some(segment) => now
                .signed_duration_since(segment.started_at)
                .to_std()
                // a clock stepped backwards keeps the current segment open
                .map(|age| age >= self.segment_duration)
                .unwrap_or(false),
            None => true,
        };

        let mut promoted = None;
        if rotate {
            if self.open.is_some() {
                promoted = self.close()?;
            }
            self.open = Some(self.open_segment(now)?);
        }

        if let Some(segment) = self.open.as_mut() {
            if let Err(source) = segment.file.write_all(chunk) {
                let path = segment.staging_path.clone();
                self.discard();
                return Err(ArchiveError::Append { path, source });
            }
            segment.bytes_written += chunk.len() as u64;
        }

        Ok(promoted)
    }

    /// Promote the open segment to its final name: flush, close the handle,
    /// rename staging to final. Empty segments are removed, never promoted.
    pub fn close(&mut self) -> Result<Option<PathBuf>, ArchiveError> {
        let Some(mut segment) = self.open.take() else {
            return Ok(None);
        };

        if let Err(source) = segment.file.flush() {
            let path = segment.staging_path.clone();
            drop(segment.file);
            let _ = fs::remove_file(&path);
            return Err(ArchiveError::Finalize { path, source });
        }
        drop(segment.file);

        if segment.bytes_written == 0 {
            let _ = fs::remove_file(&segment.staging_path);
            return Ok(None);
        }

        if let Err(source) = fs::rename(&segment.staging_path, &segment.final_path) {
            let _ = fs::remove_file(&segment.staging_path);
            return Err(ArchiveError::Finalize {
                path: segment.final_path,
                source,
            });
        }

        info!("Completed recording segment {:?}", segment.final_path);
        Ok(Some(segment.final_path))
    }

    /// Drop the open segment without promoting it; the staging file is
    /// removed so it cannot later surface under a final name.
    pub fn discard(&mut self) {
        if let Some(segment) = self.open.take() {
            drop(segment.file);
            if let Err(e) = fs::remove_file(&segment.staging_path) {
                warn!(
                    "Failed to remove staged segment {:?}: {}",
                    segment.staging_path, e
                );
            }
        }
    }

    fn open_segment(&self, now: DateTime<Local>) -> Result<OpenSegment, ArchiveError> {
        let (staging_path, final_path) = self.segment_paths(now);
        let file = File::create(&staging_path).map_err(|source| ArchiveError::Open {
            path: staging_path.clone(),
            source,
        })?;

        Ok(OpenSegment {
            started_at: now,
            staging_path,
            final_path,
            file: BufWriter::new(file),
            bytes_written: 0,
        })
    }

    /// Pick the paths for a segment opened at `now`. Second-resolution
    /// timestamps can collide when toggled faster than once a second; a
    /// numeric suffix disambiguates instead of silently overwriting.
    fn segment_paths(&self, now: DateTime<Local>) -> (PathBuf, PathBuf) {
        let base = format!("raw_{}", now.format("%Y-%m-%d_%H-%M-%S"));
        let mut candidate = self.save_dir.join(format!("{base}.{ARCHIVE_EXT}"));
        let mut n = 1u32;
        loop {
            let staging = candidate.with_extension(STAGING_EXT);
            if !candidate.exists() && !staging.exists() {
                return (staging, candidate);
            }
            n += 1;
            candidate = self.save_dir.join(format!("{base}_{n}.{ARCHIVE_EXT}"));
        }
    }
}
