//! Lifecycle of the renderer and the fixed order of work inside one frame.

use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Uninitialized,
    DeviceReady,
    ScenePrepared,
    Rendering,
    DeviceLost,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    UpdateAnimation,
    RefitSpatialStructure,
    PopulateConstants,
    Dispatch,
    Composite,
    Present,
}

impl FramePhase {
    pub const ORDER: [FramePhase; 6] = [
        FramePhase::UpdateAnimation,
        FramePhase::RefitSpatialStructure,
        FramePhase::PopulateConstants,
        FramePhase::Dispatch,
        FramePhase::Composite,
        FramePhase::Present,
    ];

    fn position(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: FrameState,
    },
    #[error("frame phase {next:?} cannot follow {previous:?}")]
    OutOfOrder {
        previous: Option<FramePhase>,
        next: FramePhase,
    },
}

#[derive(Debug)]
pub struct Orchestrator {
    state: FrameState,
    phase: Option<FramePhase>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            state: FrameState::Uninitialized,
            phase: None,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn phase(&self) -> Option<FramePhase> {
        self.phase
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: &[FrameState],
        to: FrameState,
    ) -> Result<(), TransitionError> {
        if !from.contains(&self.state) {
            return Err(TransitionError::InvalidState {
                action,
                state: self.state,
            });
        }
        log::debug!("{:?} -> {to:?}", self.state);
        self.state = to;
        self.phase = None;

        Ok(())
    }

    pub fn device_created(&mut self) -> Result<(), TransitionError> {
        self.transition(
            "create the device",
            &[FrameState::Uninitialized],
            FrameState::DeviceReady,
        )
    }

    pub fn scene_prepared(&mut self) -> Result<(), TransitionError> {
        self.transition(
            "prepare the scene",
            &[FrameState::DeviceReady],
            FrameState::ScenePrepared,
        )
    }

    pub fn begin_rendering(&mut self) -> Result<(), TransitionError> {
        self.transition(
            "begin rendering",
            &[FrameState::ScenePrepared],
            FrameState::Rendering,
        )
    }

    pub fn device_lost(&mut self) -> Result<(), TransitionError> {
        self.transition(
            "lose the device",
            &[FrameState::Rendering],
            FrameState::DeviceLost,
        )
    }

    pub fn device_restored(&mut self) -> Result<(), TransitionError> {
        self.transition(
            "restore the device",
            &[FrameState::DeviceLost],
            FrameState::DeviceReady,
        )
    }

    pub fn destroy(&mut self) -> Result<(), TransitionError> {
        self.transition(
            "destroy",
            &[
                FrameState::Uninitialized,
                FrameState::DeviceReady,
                FrameState::ScenePrepared,
                FrameState::Rendering,
                FrameState::DeviceLost,
            ],
            FrameState::Destroyed,
        )
    }

    /// Marks the start of `phase` in the current frame.
    ///
    /// A frame always starts with [`FramePhase::UpdateAnimation`], which also abandons a
    /// frame cut short. Every other phase must directly follow its predecessor.
    pub fn enter_phase(&mut self, phase: FramePhase) -> Result<(), TransitionError> {
        if self.state != FrameState::Rendering {
            return Err(TransitionError::InvalidState {
                action: "record a frame",
                state: self.state,
            });
        }

        let expected = match self.phase {
            Some(previous) if previous != FramePhase::Present => previous.position() + 1,
            _ => 0,
        };
        if phase != FramePhase::UpdateAnimation && phase.position() != expected {
            return Err(TransitionError::OutOfOrder {
                previous: self.phase,
                next: phase,
            });
        }
        self.phase = Some(phase);

        Ok(())
    }
}

/// Limits how often animated transforms advance and the acceleration structures refit.
#[derive(Debug, Clone, Copy)]
pub struct RefitThrottle {
    pub interval: Duration,
    last: Option<Instant>,
}

impl Default for RefitThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(15))
    }
}

impl RefitThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when at least `interval` passed since the last accepted refit.
    pub fn should_refit(&mut self, now: Instant) -> bool {
        let due = match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendering() -> Orchestrator {
        let mut orchestrator = Orchestrator::new();
        orchestrator.device_created().unwrap();
        orchestrator.scene_prepared().unwrap();
        orchestrator.begin_rendering().unwrap();
        orchestrator
    }

    #[test]
    fn startup_sequence() {
        let orchestrator = rendering();
        assert_eq!(orchestrator.state(), FrameState::Rendering);
    }

    #[test]
    fn cannot_skip_scene_preparation() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.device_created().unwrap();

        assert_eq!(
            orchestrator.begin_rendering(),
            Err(TransitionError::InvalidState {
                action: "begin rendering",
                state: FrameState::DeviceReady
            })
        );
    }

    #[test]
    fn device_loss_only_while_rendering() {
        let mut orchestrator = Orchestrator::new();
        assert!(orchestrator.device_lost().is_err());

        let mut orchestrator = rendering();
        orchestrator.device_lost().unwrap();
        assert!(orchestrator.device_lost().is_err());
        assert!(orchestrator.begin_rendering().is_err());
    }

    #[test]
    fn recovery_goes_back_through_scene_preparation() {
        let mut orchestrator = rendering();
        orchestrator.device_lost().unwrap();
        orchestrator.device_restored().unwrap();
        assert_eq!(orchestrator.state(), FrameState::DeviceReady);

        orchestrator.scene_prepared().unwrap();
        orchestrator.begin_rendering().unwrap();
        assert_eq!(orchestrator.state(), FrameState::Rendering);
    }

    #[test]
    fn destroy_is_terminal() {
        let mut orchestrator = rendering();
        orchestrator.destroy().unwrap();
        assert_eq!(orchestrator.state(), FrameState::Destroyed);
        assert!(orchestrator.destroy().is_err());
        assert!(orchestrator.device_created().is_err());

        let mut lost = rendering();
        lost.device_lost().unwrap();
        lost.destroy().unwrap();
    }

    #[test]
    fn phases_follow_the_fixed_order() {
        let mut orchestrator = rendering();
        for _ in 0..2 {
            for phase in FramePhase::ORDER {
                orchestrator.enter_phase(phase).unwrap();
            }
        }
        assert_eq!(orchestrator.phase(), Some(FramePhase::Present));
    }

    #[test]
    fn phases_cannot_be_skipped() {
        let mut orchestrator = rendering();
        orchestrator.enter_phase(FramePhase::UpdateAnimation).unwrap();

        assert_eq!(
            orchestrator.enter_phase(FramePhase::Dispatch),
            Err(TransitionError::OutOfOrder {
                previous: Some(FramePhase::UpdateAnimation),
                next: FramePhase::Dispatch
            })
        );
        assert!(orchestrator.enter_phase(FramePhase::Present).is_err());
    }

    #[test]
    fn abandoned_frame_restarts_at_animation() {
        let mut orchestrator = rendering();
        orchestrator.enter_phase(FramePhase::UpdateAnimation).unwrap();
        orchestrator
            .enter_phase(FramePhase::RefitSpatialStructure)
            .unwrap();

        orchestrator.enter_phase(FramePhase::UpdateAnimation).unwrap();
        assert_eq!(orchestrator.phase(), Some(FramePhase::UpdateAnimation));
    }

    #[test]
    fn phases_require_rendering_state() {
        let mut orchestrator = Orchestrator::new();
        assert!(orchestrator
            .enter_phase(FramePhase::UpdateAnimation)
            .is_err());
    }

    #[test]
    fn state_change_clears_the_frame_phase() {
        let mut orchestrator = rendering();
        orchestrator.enter_phase(FramePhase::UpdateAnimation).unwrap();
        orchestrator.device_lost().unwrap();
        assert_eq!(orchestrator.phase(), None);
    }

    #[test]
    fn first_refit_is_immediate() {
        let mut throttle = RefitThrottle::default();
        assert!(throttle.should_refit(Instant::now()));
    }

    #[test]
    fn refit_waits_for_interval() {
        let mut throttle = RefitThrottle::default();
        let start = Instant::now();

        assert!(throttle.should_refit(start));
        assert!(!throttle.should_refit(start + Duration::from_millis(14)));
        assert!(throttle.should_refit(start + Duration::from_millis(15)));
        assert!(!throttle.should_refit(start + Duration::from_millis(20)));
        assert!(throttle.should_refit(start + Duration::from_millis(31)));
    }

    #[test]
    fn clock_going_backwards_does_not_refit() {
        let mut throttle = RefitThrottle::default();
        let start = Instant::now() + Duration::from_secs(1);

        assert!(throttle.should_refit(start));
        assert!(!throttle.should_refit(start - Duration::from_millis(500)));
    }
}
