use crate::raycast::{ray_obb_distance, RayHit, Raycaster};
use crate::SceneError;
use gazerig_config::FormationConfig;
use gazerig_tracker::Ray;
use glam::{Quat, Vec3};
use std::fmt;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Scene-unique target identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// In the pool but not presented. Invisible to raycasts.
    Dormant,
    /// Presented and interactive.
    Active,
    /// Consumed by a dwell hit. Never interactive again.
    Destroyed,
}

/// What delivering a dwell hit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellOutcome {
    /// First delivery: the target was destroyed and its signal fired.
    Destroyed,
    /// The target was already destroyed, dormant, or unknown. No-op.
    AlreadyGone,
}

/// One cube target. Pose and cosmetics are fixed at creation; only the
/// lifecycle state changes.
pub struct Target {
    pub id: TargetId,
    /// World-space center, meters.
    pub position: Vec3,
    pub rotation: Quat,
    /// Uniform edge length, meters.
    pub scale: f32,
    /// Cosmetic RGB.
    pub color: [f32; 3],
    state: TargetState,
    destroyed_tx: Option<oneshot::Sender<TargetId>>,
}

impl Target {
    pub fn new(id: TargetId, position: Vec3, rotation: Quat, scale: f32, color: [f32; 3]) -> Self {
        Self {
            id,
            position,
            rotation,
            scale,
            color,
            state: TargetState::Dormant,
            destroyed_tx: None,
        }
    }

    pub fn state(&self) -> TargetState {
        self.state
    }
}

/// The pool of remaining targets for a session.
pub struct TargetPool {
    targets: Vec<Target>,
}

impl TargetPool {
    pub fn empty() -> Self {
        Self {
            targets: Vec::new(),
        }
    }

    pub fn from_targets(targets: Vec<Target>) -> Self {
        Self { targets }
    }

    /// Build the full formation: positions from config, a random
    /// orientation and color per target.
    pub fn from_config(config: &FormationConfig, rng: &mut fastrand::Rng) -> Self {
        let targets = config
            .positions()
            .into_iter()
            .enumerate()
            .map(|(i, position)| {
                Target::new(
                    TargetId(i as u32),
                    position,
                    random_rotation(rng),
                    config.target_scale,
                    [rng.f32(), rng.f32(), rng.f32()],
                )
            })
            .collect();
        Self { targets }
    }

    /// Wrap for sharing between the frame tick and the sequencer task.
    pub fn into_shared(self) -> crate::SharedPool {
        std::sync::Arc::new(parking_lot::Mutex::new(self))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Ids of every target still in the pool, in creation order.
    pub fn remaining(&self) -> Vec<TargetId> {
        self.targets.iter().map(|t| t.id).collect()
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// The currently presented target, if any.
    pub fn active_target(&self) -> Option<&Target> {
        self.targets.iter().find(|t| t.state == TargetState::Active)
    }

    /// Present a target. Exactly-once per target: the destruction signal
    /// is installed here and there is no way to re-arm it.
    pub fn activate(&mut self, id: TargetId) -> Result<oneshot::Receiver<TargetId>, SceneError> {
        let target = self
            .targets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(SceneError::UnknownTarget(id))?;

        if target.state != TargetState::Dormant {
            return Err(SceneError::AlreadyActivated(id));
        }

        let (tx, rx) = oneshot::channel();
        target.state = TargetState::Active;
        target.destroyed_tx = Some(tx);
        info!(target = %id, position = ?target.position, "Target activated");
        Ok(rx)
    }

    /// Deliver a dwell hit. Idempotent: the first delivery on an active
    /// target destroys it and fires its signal; anything else is a no-op.
    pub fn dwell_hit(&mut self, id: TargetId) -> DwellOutcome {
        let Some(target) = self.targets.iter_mut().find(|t| t.id == id) else {
            return DwellOutcome::AlreadyGone;
        };

        if target.state != TargetState::Active {
            return DwellOutcome::AlreadyGone;
        }

        target.state = TargetState::Destroyed;
        if let Some(tx) = target.destroyed_tx.take() {
            // Receiver may already be dropped; destruction stands either way.
            let _ = tx.send(id);
        }
        info!(target = %id, "Target destroyed by dwell hit");
        DwellOutcome::Destroyed
    }

    /// Drop a target from the pool entirely.
    pub fn remove(&mut self, id: TargetId) -> Result<(), SceneError> {
        let before = self.targets.len();
        self.targets.retain(|t| t.id != id);
        if self.targets.len() == before {
            return Err(SceneError::UnknownTarget(id));
        }
        debug!(target = %id, remaining = self.targets.len(), "Target removed from pool");
        Ok(())
    }
}

impl Raycaster for TargetPool {
    /// Nearest hit among active targets only.
    fn cast(&self, ray: &Ray) -> Option<RayHit> {
        self.targets
            .iter()
            .filter(|t| t.state == TargetState::Active)
            .filter_map(|t| {
                ray_obb_distance(ray, t.position, t.rotation, t.scale / 2.0)
                    .map(|distance| RayHit {
                        target: t.id,
                        distance,
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Uniform random unit quaternion (Shoemake's method).
fn random_rotation(rng: &mut fastrand::Rng) -> Quat {
    let u1 = rng.f32();
    let u2 = rng.f32() * std::f32::consts::TAU;
    let u3 = rng.f32() * std::f32::consts::TAU;
    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    Quat::from_xyzw(a * u2.sin(), a * u2.cos(), b * u3.sin(), b * u3.cos())
}
