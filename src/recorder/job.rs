//! The outer recovery loop and the host-facing control surface.
//!
//! One dedicated thread owns the pipeline, the relay, and the segment writer;
//! the host only ever touches the two atomic flags in [`ControlFlags`]. The
//! loop keeps restarting the pipeline after any failure for as long as the
//! host wants the recorder alive.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{error, info, warn};

use super::janitor::clean_stale_outputs;
use super::pipeline::{MediaPipeline, PipelineSpawner, ProcessSupervisor};
use super::relay::{run_relay, ControlFlags, RelayOutcome};
use super::segments::SegmentWriter;
use super::state::{transition, LifecyclePhase, RecorderEvent, SideEffect};
use crate::config::RecorderConfig;
use crate::faultlog::FaultLog;

const COOLDOWN_SLICE: Duration = Duration::from_millis(100);

/// The long-lived recorder: recovery loop plus the inline relay.
pub struct RecorderJob<S: PipelineSpawner> {
    config: RecorderConfig,
    spawner: S,
    segments: SegmentWriter,
    faults: FaultLog,
    flags: ControlFlags,
    phase: LifecyclePhase,
}

impl RecorderJob<ProcessSupervisor> {
    /// Start the recorder on its own thread and hand back the host-facing
    /// control surface.
    pub fn spawn(config: RecorderConfig) -> std::io::Result<RecorderHandle> {
        let flags = ControlFlags::new();
        let mut job = RecorderJob::new(config, ProcessSupervisor, flags.clone());
        let thread = thread::Builder::new()
            .name("camcast-recorder".to_string())
            .spawn(move || job.run())?;

        Ok(RecorderHandle {
            flags,
            thread: Some(thread),
        })
    }
}

impl<S: PipelineSpawner> RecorderJob<S> {
    pub fn new(config: RecorderConfig, spawner: S, flags: ControlFlags) -> Self {
        let segments = SegmentWriter::new(config.save_dir.clone(), config.segment_duration());
        let faults = FaultLog::new(config.fault_log.clone());
        Self {
            config,
            spawner,
            segments,
            faults,
            flags,
            phase: LifecyclePhase::Idle,
        }
    }

    /// Drive the lifecycle until it terminates. Any unexpected fault inside a
    /// cycle is caught here, logged, and treated like a failed iteration, so
    /// the loop never exits while the host still wants the recorder alive.
    pub fn run(&mut self) {
        info!("Recorder started");
        while self.phase != LifecyclePhase::Terminated {
            if self.flags.shutdown_requested() {
                let (next, _) = transition(self.phase, RecorderEvent::ShutdownRequested);
                self.phase = next;
                continue;
            }

            let cycle = panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle()));
            if cycle.is_err() {
                error!("Recorder cycle panicked, restarting after cooldown");
                self.faults
                    .record(Local::now(), "internal error in recorder cycle");
                self.segments.discard();
                self.phase = LifecyclePhase::Idle;
                self.cooldown();
            }
        }
        info!("Recorder terminated");
    }

    /// One Idle → Streaming → (Idle | Terminated) pass: clean the live
    /// directory, spawn the pipeline, relay until something ends the
    /// iteration, then apply the resulting transition.
    fn run_cycle(&mut self) {
        clean_stale_outputs(&self.config.live_dir, &self.config.stream_name);

        let mut pipeline = match self.spawner.spawn_pipeline(&self.config) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!("Failed to start pipeline: {}", e);
                self.apply(RecorderEvent::SpawnFailed, None);
                return;
            }
        };
        self.apply(RecorderEvent::PipelineSpawned, Some(&mut pipeline));

        let event = match (pipeline.take_source(), pipeline.take_sink()) {
            (Some(mut source), Some(mut sink)) => {
                match run_relay(&mut source, &mut sink, &mut self.segments, &self.flags) {
                    RelayOutcome::ShutdownRequested => RecorderEvent::ShutdownRequested,
                    RelayOutcome::SinkClosed => RecorderEvent::RelayAborted,
                    RelayOutcome::SourceClosed => {
                        drop(sink);
                        match pipeline.wait_capture() {
                            Ok(exit) => {
                                if !exit.success {
                                    error!(
                                        "Capture process exited with status {}",
                                        exit.code.unwrap_or(-1)
                                    );
                                }
                                RecorderEvent::CaptureExited {
                                    success: exit.success,
                                }
                            }
                            Err(e) => {
                                error!("Failed to reap capture process: {}", e);
                                RecorderEvent::RelayAborted
                            }
                        }
                    }
                }
            }
            _ => {
                error!("Pipeline did not expose both stdio handles");
                RecorderEvent::RelayAborted
            }
        };

        self.apply(event, Some(&mut pipeline));

        if self.phase == LifecyclePhase::Draining {
            self.apply(RecorderEvent::DrainCompleted, Some(&mut pipeline));
        }
    }

    fn apply(&mut self, event: RecorderEvent, mut pipeline: Option<&mut S::Pipeline>) {
        let (next, effects) = transition(self.phase, event);
        self.phase = next;

        for effect in effects {
            match effect {
                SideEffect::StopPipeline => {
                    if let Some(pipeline) = pipeline.as_deref_mut() {
                        pipeline.shutdown();
                    }
                }
                SideEffect::PromoteSegment => {
                    if let Err(e) = self.segments.close() {
                        warn!("Failed to finalize segment: {}", e);
                    }
                }
                SideEffect::DiscardSegment => self.segments.discard(),
                SideEffect::RecordFault => self.faults.record(Local::now(), fault_detail(event)),
                SideEffect::Cooldown => self.cooldown(),
            }
        }
    }

    /// Sliced sleep so a disconnect during cooldown still sees a bounded
    /// shutdown latency.
    fn cooldown(&self) {
        let deadline = Instant::now() + self.config.cooldown();
        while Instant::now() < deadline && !self.flags.shutdown_requested() {
            thread::sleep(COOLDOWN_SLICE);
        }
    }
}

fn fault_detail(event: RecorderEvent) -> &'static str {
    match event {
        RecorderEvent::SpawnFailed => "pipeline failed to start",
        RecorderEvent::CaptureExited { .. } => "capture process exited with an error",
        RecorderEvent::RelayAborted => "live stream pipe closed unexpectedly",
        _ => "recording interval failed",
    }
}

/// Host-facing control surface: the settable recording flag and disconnect.
/// This is the interface the embedding job framework publishes.
pub struct RecorderHandle {
    flags: ControlFlags,
    thread: Option<JoinHandle<()>>,
}

impl RecorderHandle {
    /// Toggle archive recording. Always succeeds from the caller's point of
    /// view; the relay honors the new value within one chunk iteration.
    pub fn set_is_recording(&self, value: bool) {
        if self.flags.recording.swap(value, Ordering::SeqCst) != value {
            info!("Recording {}", if value { "enabled" } else { "disabled" });
        }
    }

    pub fn is_recording(&self) -> bool {
        self.flags.recording()
    }

    /// Request shutdown and wait for the recorder thread to finish.
    pub fn disconnect(mut self) {
        self.flags.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Recorder thread panicked during shutdown");
            }
        }
    }
}

impl Drop for RecorderHandle {
    fn drop(&mut self) {
        self.flags.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
