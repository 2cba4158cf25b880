pub mod probe;
pub mod raycast;
pub mod target;

pub use probe::{sweep, DwellEvent};
pub use raycast::{ray_obb_distance, RayHit, Raycaster};
pub use target::{DwellOutcome, Target, TargetId, TargetPool, TargetState};

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Target pool shared between the frame tick and the sequencer task.
/// Critical sections are short and never held across an await.
pub type SharedPool = Arc<Mutex<TargetPool>>;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("target {0} not in pool")]
    UnknownTarget(TargetId),
    #[error("target {0} already activated")]
    AlreadyActivated(TargetId),
}
