//! End-to-end recovery loop behavior: restart after failures, stale live
//! output cleanup between iterations, and (on unix) a full run against real
//! child processes standing in for the camera and the HLS muxer.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use camcast::config::RecorderConfig;
use camcast::recorder::errors::PipelineError;
use camcast::recorder::pipeline::{MediaPipeline, PipelineExit, PipelineSpawner};
use camcast::recorder::{ControlFlags, RecorderJob};
use tempfile::TempDir;

struct FakePipeline {
    source: Option<Box<dyn Read + Send>>,
    sink: Option<Box<dyn Write + Send>>,
    exit: PipelineExit,
}

impl MediaPipeline for FakePipeline {
    type Source = Box<dyn Read + Send>;
    type Sink = Box<dyn Write + Send>;

    fn take_source(&mut self) -> Option<Self::Source> {
        self.source.take()
    }

    fn take_sink(&mut self) -> Option<Self::Sink> {
        self.sink.take()
    }

    fn wait_capture(&mut self) -> io::Result<PipelineExit> {
        Ok(self.exit)
    }

    fn shutdown(&mut self) {}
}

/// Scripted spawner: hands out prepared pipelines, simulates the transcode
/// process dirtying the live directory, and asks for shutdown once the
/// script runs out so `run()` returns.
struct ScriptedSpawner {
    pipelines: Mutex<VecDeque<FakePipeline>>,
    spawns: Arc<AtomicUsize>,
    dirty_at_spawn: Arc<AtomicUsize>,
    manifest: std::path::PathBuf,
    flags: ControlFlags,
}

impl ScriptedSpawner {
    fn new(config: &RecorderConfig, flags: ControlFlags, pipelines: Vec<FakePipeline>) -> Self {
        Self {
            pipelines: Mutex::new(pipelines.into()),
            spawns: Arc::new(AtomicUsize::new(0)),
            dirty_at_spawn: Arc::new(AtomicUsize::new(0)),
            manifest: config.manifest_path(),
            flags,
        }
    }
}

impl PipelineSpawner for ScriptedSpawner {
    type Pipeline = FakePipeline;

    fn spawn_pipeline(&self, _config: &RecorderConfig) -> Result<FakePipeline, PipelineError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        if self.manifest.exists() {
            self.dirty_at_spawn.fetch_add(1, Ordering::SeqCst);
        }

        match self.pipelines.lock().unwrap().pop_front() {
            Some(pipeline) => {
                // The next iteration's janitor must remove this again.
                std::fs::write(&self.manifest, b"#EXTM3U").expect("seed manifest");
                Ok(pipeline)
            }
            None => {
                self.flags.shutdown.store(true, Ordering::SeqCst);
                Err(PipelineError::CaptureSpawn {
                    bin: "fake".to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "script exhausted"),
                })
            }
        }
    }
}

fn test_config(temp: &TempDir) -> RecorderConfig {
    let config = RecorderConfig {
        save_dir: temp.path().join("save"),
        live_dir: temp.path().join("live"),
        fault_log: temp.path().join("failures.log"),
        cooldown_secs: 0,
        stop_timeout_secs: 1,
        ..Default::default()
    };
    config.ensure_dirs().expect("ensure dirs");
    config
}

fn failing_pipeline(bytes: usize) -> FakePipeline {
    FakePipeline {
        source: Some(Box::new(Cursor::new(vec![0xAAu8; bytes]))),
        sink: Some(Box::new(io::sink())),
        exit: PipelineExit {
            success: false,
            code: Some(1),
        },
    }
}

#[test]
fn restarts_until_disconnect_and_cleans_between_iterations() {
    let temp = TempDir::new().expect("tempdir");
    let config = test_config(&temp);

    let flags = ControlFlags::new();
    flags.recording.store(true, Ordering::SeqCst);

    let spawner = ScriptedSpawner::new(
        &config,
        flags.clone(),
        vec![failing_pipeline(30_000), failing_pipeline(30_000)],
    );
    let spawns = spawner.spawns.clone();

    let mut job = RecorderJob::new(config.clone(), spawner, flags);
    job.run();

    // Two scripted iterations plus the exhausted attempt.
    assert_eq!(spawns.load(Ordering::SeqCst), 3);
    let faults = std::fs::read_to_string(&config.fault_log).expect("read fault log");
    let lines: Vec<&str> = faults.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("capture process exited with an error"));
    assert!(lines[2].contains("pipeline failed to start"));

    // Failed intervals never leave archive files, staged or final.
    assert_eq!(
        std::fs::read_dir(&config.save_dir).expect("read dir").count(),
        0
    );

    // The janitor removed the manifest seeded by the last iteration.
    assert!(!config.manifest_path().exists());
}

#[test]
fn janitor_runs_before_every_spawn() {
    let temp = TempDir::new().expect("tempdir");
    let config = test_config(&temp);

    // Pretend a previous incarnation died mid-stream.
    std::fs::write(config.manifest_path(), b"#EXTM3U").expect("seed stale manifest");
    std::fs::write(config.live_dir.join("webcam0.ts"), b"x").expect("seed stale fragment");

    let flags = ControlFlags::new();
    let spawner = ScriptedSpawner::new(
        &config,
        flags.clone(),
        vec![failing_pipeline(1000), failing_pipeline(1000)],
    );
    let dirty = spawner.dirty_at_spawn.clone();

    let mut job = RecorderJob::new(config.clone(), spawner, flags);
    job.run();

    // Every spawn saw a clean live directory, including the first.
    assert_eq!(dirty.load(Ordering::SeqCst), 0);
    assert!(!config.live_dir.join("webcam0.ts").exists());
}

#[cfg(unix)]
mod real_processes {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, body).expect("write script");
        let mut perms = std::fs::metadata(&path)
            .expect("script metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("set script perms");
        path
    }

    #[test]
    fn records_a_live_feed_end_to_end() {
        let temp = TempDir::new().expect("tempdir");
        let mut config = test_config(&temp);

        // A fake camera that streams forever and a fake muxer that writes
        // whatever it receives to its output path (the last argument).
        let capture = write_script(
            temp.path(),
            "capture.sh",
            "#!/bin/sh\nwhile :; do printf 0123456789abcdef; sleep 0.05; done\n",
        );
        let transcode = write_script(
            temp.path(),
            "transcode.sh",
            "#!/bin/sh\nlast=\"\"\nfor a in \"$@\"; do last=\"$a\"; done\ncat > \"$last\"\n",
        );
        config.capture_bin = capture.to_string_lossy().to_string();
        config.transcode_bin = transcode.to_string_lossy().to_string();

        let handle = RecorderJob::spawn(config.clone()).expect("spawn recorder");
        handle.set_is_recording(true);
        assert!(handle.is_recording());

        std::thread::sleep(Duration::from_millis(600));
        handle.disconnect();

        // The live path received data at the manifest path.
        let live = std::fs::read(config.manifest_path()).expect("read live output");
        assert!(!live.is_empty());

        // Disconnect promoted the open segment; nothing is left staged.
        let mut finals = 0;
        for entry in std::fs::read_dir(&config.save_dir).expect("read save dir") {
            let path = entry.expect("dir entry").path();
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(
                name.starts_with("raw_") && name.ends_with(".h264"),
                "unexpected archive entry: {name}"
            );
            assert!(!std::fs::read(&path).expect("read segment").is_empty());
            finals += 1;
        }
        assert_eq!(finals, 1);
    }
}
