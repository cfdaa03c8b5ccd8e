//! Pure state machine for the recorder lifecycle.
//!
//! The transition function is `(phase, event) -> (new_phase, effects)` and
//! performs no I/O; the job loop executes the returned effects. Invalid
//! transitions return the current phase with no effects.

/// Outer lifecycle of the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    /// No pipeline running; the next cycle may spawn one.
    #[default]
    Idle,
    /// A pipeline is live and the relay is pumping chunks.
    Streaming,
    /// Disconnect requested while streaming; stopping and finalizing.
    Draining,
    /// The recorder is done and will spawn nothing further.
    Terminated,
}

/// Events observed by the recovery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderEvent {
    PipelineSpawned,
    SpawnFailed,
    CaptureExited { success: bool },
    /// The downstream pipe closed or the relay hit an unrecoverable fault.
    RelayAborted,
    ShutdownRequested,
    DrainCompleted,
}

/// Side effects the job loop executes after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    StopPipeline,
    /// Close the open segment and rename it to its final path.
    PromoteSegment,
    /// Remove the open segment's staging file without promoting it.
    DiscardSegment,
    RecordFault,
    Cooldown,
}

pub fn transition(
    phase: LifecyclePhase,
    event: RecorderEvent,
) -> (LifecyclePhase, Vec<SideEffect>) {
    use LifecyclePhase::*;
    use RecorderEvent::*;
    use SideEffect::*;

    match (phase, event) {
        (Idle, ShutdownRequested) => (Terminated, vec![]),
        (Idle, PipelineSpawned) => (Streaming, vec![]),
        (Idle, SpawnFailed) => (Idle, vec![RecordFault, Cooldown]),

        (Streaming, ShutdownRequested) => (Draining, vec![StopPipeline, PromoteSegment]),
        (Streaming, CaptureExited { success: true }) => (Idle, vec![StopPipeline, PromoteSegment]),
        (Streaming, CaptureExited { success: false }) => (
            Idle,
            vec![StopPipeline, DiscardSegment, RecordFault, Cooldown],
        ),
        (Streaming, RelayAborted) => (
            Idle,
            vec![StopPipeline, DiscardSegment, RecordFault, Cooldown],
        ),

        (Draining, DrainCompleted) => (Terminated, vec![]),

        // Invalid transition: keep the phase, do nothing.
        _ => (phase, vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_shutdown_terminates_without_effects() {
        let (phase, effects) = transition(LifecyclePhase::Idle, RecorderEvent::ShutdownRequested);
        assert_eq!(phase, LifecyclePhase::Terminated);
        assert!(effects.is_empty());
    }

    #[test]
    fn spawn_failure_cools_down_and_stays_idle() {
        let (phase, effects) = transition(LifecyclePhase::Idle, RecorderEvent::SpawnFailed);
        assert_eq!(phase, LifecyclePhase::Idle);
        assert_eq!(effects, vec![SideEffect::RecordFault, SideEffect::Cooldown]);
    }

    #[test]
    fn clean_capture_exit_promotes_and_restarts_without_cooldown() {
        let (phase, effects) = transition(
            LifecyclePhase::Streaming,
            RecorderEvent::CaptureExited { success: true },
        );
        assert_eq!(phase, LifecyclePhase::Idle);
        assert_eq!(
            effects,
            vec![SideEffect::StopPipeline, SideEffect::PromoteSegment]
        );
    }

    #[test]
    fn failed_capture_discards_the_segment() {
        let (phase, effects) = transition(
            LifecyclePhase::Streaming,
            RecorderEvent::CaptureExited { success: false },
        );
        assert_eq!(phase, LifecyclePhase::Idle);
        assert_eq!(
            effects,
            vec![
                SideEffect::StopPipeline,
                SideEffect::DiscardSegment,
                SideEffect::RecordFault,
                SideEffect::Cooldown,
            ]
        );
    }

    #[test]
    fn broken_downstream_pipe_takes_the_restart_path() {
        let (phase, effects) = transition(LifecyclePhase::Streaming, RecorderEvent::RelayAborted);
        assert_eq!(phase, LifecyclePhase::Idle);
        assert!(effects.contains(&SideEffect::DiscardSegment));
        assert!(effects.contains(&SideEffect::Cooldown));
    }

    #[test]
    fn disconnect_while_streaming_drains_then_terminates() {
        let (phase, effects) = transition(
            LifecyclePhase::Streaming,
            RecorderEvent::ShutdownRequested,
        );
        assert_eq!(phase, LifecyclePhase::Draining);
        assert_eq!(
            effects,
            vec![SideEffect::StopPipeline, SideEffect::PromoteSegment]
        );

        let (phase, effects) = transition(phase, RecorderEvent::DrainCompleted);
        assert_eq!(phase, LifecyclePhase::Terminated);
        assert!(effects.is_empty());
    }

    #[test]
    fn invalid_transition_is_a_noop() {
        let (phase, effects) = transition(LifecyclePhase::Idle, RecorderEvent::DrainCompleted);
        assert_eq!(phase, LifecyclePhase::Idle);
        assert!(effects.is_empty());

        let (phase, effects) =
            transition(LifecyclePhase::Terminated, RecorderEvent::PipelineSpawned);
        assert_eq!(phase, LifecyclePhase::Terminated);
        assert!(effects.is_empty());
    }
}
