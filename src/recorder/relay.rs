//! The inner read/fan-out loop: every chunk read from the capture process is
//! written to the transcode process unconditionally and offered to the
//! archive writer when recording is enabled. Archive failures never stall or
//! stop the live path.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use tracing::warn;

use super::segments::SegmentWriter;

pub const CHUNK_SIZE: usize = 8 * 1024;

/// Why the relay loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The capture process closed its output.
    SourceClosed,
    /// The transcode process stopped accepting input.
    SinkClosed,
    /// The shutdown flag was observed.
    ShutdownRequested,
}

/// The two flags the host may flip from other threads. Everything else the
/// recorder owns outright on its own thread, so no further synchronization
/// exists.
#[derive(Clone, Default)]
pub struct ControlFlags {
    pub recording: Arc<AtomicBool>,
    pub shutdown: Arc<AtomicBool>,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Pump chunks from the capture output into the transcode input until either
/// side closes or shutdown is requested. The flags are re-read once per chunk
/// iteration; whatever value is observed is authoritative for that iteration.
pub fn run_relay<R: Read, W: Write>(
    source: &mut R,
    sink: &mut W,
    segments: &mut SegmentWriter,
    flags: &ControlFlags,
) -> RelayOutcome {
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        if flags.shutdown_requested() {
            return RelayOutcome::ShutdownRequested;
        }

        let n = match source.read(&mut buf) {
            Ok(0) => return RelayOutcome::SourceClosed,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Capture stream read failed: {}", e);
                return RelayOutcome::SourceClosed;
            }
        };
        let chunk = &buf[..n];

        // The live path comes first and is unconditional.
        if let Err(e) = sink.write_all(chunk).and_then(|()| sink.flush()) {
            warn!("Live stream sink disconnected: {}", e);
            return RelayOutcome::SinkClosed;
        }

        if flags.recording() {
            if let Err(e) = segments.offer(chunk, Local::now()) {
                warn!("Archive write failed, dropping segment: {}", e);
            }
        } else if segments.has_open() {
            if let Err(e) = segments.close() {
                warn!("Failed to finalize segment on toggle-off: {}", e);
            }
        }
    }
}
