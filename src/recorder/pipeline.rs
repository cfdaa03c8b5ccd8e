//! Process supervision for the capture/transcode pair.
//!
//! The capture process emits an H.264 elementary stream on stdout; the
//! transcode process reads it on stdin and maintains the rolling HLS output.
//! Both stderr streams are drained into the log on named threads so
//! diagnostics never mix into the payload. A pipeline is a scoped resource:
//! dropping it terminates and reaps both processes.

use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::errors::PipelineError;
use crate::config::RecorderConfig;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Final status of the capture process for one pipeline iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineExit {
    pub success: bool,
    pub code: Option<i32>,
}

/// One spawned capture/transcode pair plus the stdio handles the relay needs.
pub trait MediaPipeline: Send {
    type Source: io::Read + Send;
    type Sink: io::Write + Send;

    /// The capture process's output stream. Yields `None` once taken.
    fn take_source(&mut self) -> Option<Self::Source>;
    /// The transcode process's input stream. Yields `None` once taken.
    fn take_sink(&mut self) -> Option<Self::Sink>;
    /// Block until the capture process exits and report its status.
    fn wait_capture(&mut self) -> io::Result<PipelineExit>;
    /// Graceful-then-forced termination of both processes. Idempotent.
    fn shutdown(&mut self);
}

/// The seam that lets the recovery loop run against a fake supervisor in
/// tests instead of spawning real processes.
pub trait PipelineSpawner: Send {
    type Pipeline: MediaPipeline;

    fn spawn_pipeline(&self, config: &RecorderConfig) -> Result<Self::Pipeline, PipelineError>;
}

/// Spawns the real capture and transcode processes.
pub struct ProcessSupervisor;

impl PipelineSpawner for ProcessSupervisor {
    type Pipeline = CameraPipeline;

    fn spawn_pipeline(&self, config: &RecorderConfig) -> Result<CameraPipeline, PipelineError> {
        let mut capture =
            capture_command(config)
                .spawn()
                .map_err(|source| PipelineError::CaptureSpawn {
                    bin: config.capture_bin.clone(),
                    source,
                })?;

        let mut transcode = match transcode_command(config).spawn() {
            Ok(child) => child,
            Err(source) => {
                // The capture process must not be leaked when its partner
                // never starts.
                if let Err(e) = capture.kill() {
                    warn!("Failed to kill capture process: {}", e);
                }
                let _ = capture.wait();
                return Err(PipelineError::TranscodeSpawn {
                    bin: config.transcode_bin.clone(),
                    source,
                });
            }
        };

        let source = capture.stdout.take();
        let sink = transcode.stdin.take();
        let drains = [
            drain_stderr(&mut capture, "capture"),
            drain_stderr(&mut transcode, "transcode"),
        ]
        .into_iter()
        .flatten()
        .collect();

        Ok(CameraPipeline {
            capture,
            transcode,
            source,
            sink,
            drains,
            stop_timeout: config.stop_timeout(),
            stopped: false,
        })
    }
}

pub struct CameraPipeline {
    capture: Child,
    transcode: Child,
    source: Option<ChildStdout>,
    sink: Option<ChildStdin>,
    drains: Vec<JoinHandle<()>>,
    stop_timeout: Duration,
    stopped: bool,
}

impl MediaPipeline for CameraPipeline {
    type Source = ChildStdout;
    type Sink = ChildStdin;

    fn take_source(&mut self) -> Option<ChildStdout> {
        self.source.take()
    }

    fn take_sink(&mut self) -> Option<ChildStdin> {
        self.sink.take()
    }

    fn wait_capture(&mut self) -> io::Result<PipelineExit> {
        let status = self.capture.wait()?;
        Ok(PipelineExit {
            success: status.success(),
            code: status.code(),
        })
    }

    fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        // Dropping the transcode stdin hands it a clean end-of-stream before
        // any signal arrives.
        self.sink = None;
        self.source = None;

        terminate(&mut self.capture, "capture", self.stop_timeout);
        terminate(&mut self.transcode, "transcode", self.stop_timeout);

        for drain in self.drains.drain(..) {
            let _ = drain.join();
        }
    }
}

impl Drop for CameraPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Ask the process to exit, wait up to `timeout`, then escalate to a kill.
/// The final wait reaps the process on every path.
fn terminate(child: &mut Child, label: &str, timeout: Duration) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!("{} process already exited with {}", label, status);
            return;
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to poll {} process: {}", label, e),
    }

    request_term(child, label);

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("{} process exited with {}", label, status);
                return;
            }
            Ok(None) => thread::sleep(STOP_POLL_INTERVAL),
            Err(e) => {
                warn!("Failed to poll {} process: {}", label, e);
                break;
            }
        }
    }

    warn!("{} process ignored the termination request, killing it", label);
    if let Err(e) = child.kill() {
        warn!("Failed to kill {} process: {}", label, e);
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap {} process: {}", label, e);
    }
}

#[cfg(unix)]
fn request_term(child: &Child, label: &str) {
    // SAFETY: plain kill(2) on a pid we own that has not been reaped yet.
    let ret = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    if ret != 0 {
        warn!(
            "Failed to send SIGTERM to {} process: {}",
            label,
            io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn request_term(_child: &Child, _label: &str) {}

/// Forward a child's stderr lines into the log on a named thread.
fn drain_stderr(child: &mut Child, label: &'static str) -> Option<JoinHandle<()>> {
    let stderr = child.stderr.take()?;
    thread::Builder::new()
        .name(format!("{label}-stderr"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) if !line.trim().is_empty() => {
                        debug!(target: "camcast::pipeline", "{}: {}", label, line.trim());
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        })
        .ok()
}

fn capture_command(config: &RecorderConfig) -> Command {
    let mut cmd = Command::new(&config.capture_bin);
    cmd.arg("-t")
        .arg("0")
        .arg("--width")
        .arg(config.width.to_string())
        .arg("--height")
        .arg(config.height.to_string())
        .arg("--framerate")
        .arg(config.framerate.to_string());
    if config.vflip {
        cmd.arg("--vflip");
    }
    cmd.arg("--nopreview")
        .arg("--codec")
        .arg("h264")
        .arg("--profile")
        .arg("high")
        .arg("--inline")
        .arg("--level")
        .arg("4.2")
        .arg("-o")
        .arg("-")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

fn transcode_command(config: &RecorderConfig) -> Command {
    let mut cmd = Command::new(&config.transcode_bin);
    cmd.arg("-nostdin")
        .arg("-f")
        .arg("h264")
        .arg("-i")
        .arg("-")
        .arg("-c")
        .arg("copy")
        .arg("-f")
        .arg("hls")
        .arg("-hls_time")
        .arg(config.hls_fragment_secs.to_string())
        .arg("-hls_list_size")
        .arg(config.hls_window_size.to_string());
    if config.hls_delete_stale {
        cmd.arg("-hls_flags").arg("delete_segments");
    }
    cmd.arg(config.manifest_path())
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    cmd
}
