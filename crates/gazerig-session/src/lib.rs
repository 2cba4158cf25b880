pub mod frame;
pub mod sequencer;

pub use frame::FramePump;
pub use sequencer::{SessionPhase, SessionSummary, TrialOutcome, TrialSequencer};

use gazerig_recorder::RecorderError;
use gazerig_scene::{SceneError, SharedPool};
use gazerig_tracker::FocusProvider;
use glam::Vec3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("tracker went away before becoming ready")]
    TrackerGone,
    #[error("active target vanished during trial {trial}")]
    TargetVanished { trial: u32 },
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Aims the simulated subject at whatever target is currently active.
/// The real experiment relies on the human subject finding the cube; the
/// simulator gets the active target's position instead.
pub struct ActiveTargetFocus {
    pool: SharedPool,
}

impl ActiveTargetFocus {
    pub fn new(pool: SharedPool) -> Self {
        Self { pool }
    }
}

impl FocusProvider for ActiveTargetFocus {
    fn focus_point(&self) -> Option<Vec3> {
        self.pool.lock().active_target().map(|t| t.position)
    }
}
