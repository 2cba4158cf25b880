use gazerig_scene::{probe, DwellEvent, SharedPool};
use gazerig_tracker::{host_timestamp_ms, CameraPose, GazeSnapshot};
use glam::{Quat, Vec3};
use tokio::sync::watch;

/// The per-frame half of the pipeline.
///
/// Each tick stamps the current camera pose with the host clock,
/// publishes it for the sample projector, reprojects the latest snapshot
/// from the new pose and sweeps the collision probe. Exactly one tick per
/// rendered frame; sample-rate work stays on the tracker task.
pub struct FramePump {
    snapshot_rx: watch::Receiver<Option<GazeSnapshot>>,
    pose_tx: watch::Sender<CameraPose>,
    pool: SharedPool,
}

impl FramePump {
    pub fn new(
        snapshot_rx: watch::Receiver<Option<GazeSnapshot>>,
        pose_tx: watch::Sender<CameraPose>,
        pool: SharedPool,
    ) -> Self {
        Self {
            snapshot_rx,
            pose_tx,
            pool,
        }
    }

    pub fn tick(&mut self, position: Vec3, orientation: Quat) -> Vec<DwellEvent> {
        let pose = CameraPose {
            position,
            orientation,
            host_timestamp_ms: host_timestamp_ms(),
        };
        let _ = self.pose_tx.send(pose);

        // Nothing to probe until the first sample lands.
        let Some(snapshot) = *self.snapshot_rx.borrow() else {
            return Vec::new();
        };

        let rays = snapshot.rays_at(&pose);
        let mut pool = self.pool.lock();
        probe::sweep(&mut pool, &rays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazerig_scene::{DwellOutcome, Target, TargetId, TargetPool, TargetState};
    use gazerig_tracker::projection::project;
    use gazerig_tracker::{EyeSample, GazeValidity, RawGazeSample};
    use std::f32::consts::FRAC_PI_2;

    fn forward_raw() -> RawGazeSample {
        let eye = EyeSample {
            origin_mm: Vec3::new(0.0, 0.0, -39.0),
            direction: Vec3::Z,
            pupil_diameter_mm: 3.5,
            validity_mask: GazeValidity::full_mask(),
        };
        RawGazeSample {
            timestamp_ms: 10,
            left: eye,
            right: eye,
            combined: eye,
        }
    }

    fn rig_with_target(position: Vec3) -> (FramePump, watch::Sender<Option<GazeSnapshot>>, watch::Receiver<CameraPose>, SharedPool) {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (pose_tx, pose_rx) = watch::channel(CameraPose::default());
        let pool = TargetPool::from_targets(vec![Target::new(
            TargetId(0),
            position,
            Quat::IDENTITY,
            0.15,
            [1.0, 1.0, 1.0],
        )])
        .into_shared();
        let pump = FramePump::new(snapshot_rx, pose_tx, pool.clone());
        (pump, snapshot_tx, pose_rx, pool)
    }

    #[test]
    fn tick_stamps_and_publishes_the_pose() {
        let (mut pump, _snapshot_tx, pose_rx, _pool) = rig_with_target(Vec3::new(0.0, 1.6, 2.0));

        let events = pump.tick(Vec3::new(0.0, 1.6, 0.0), Quat::IDENTITY);
        assert!(events.is_empty());

        let pose = *pose_rx.borrow();
        assert_eq!(pose.position, Vec3::new(0.0, 1.6, 0.0));
        assert!(pose.host_timestamp_ms > 0);
    }

    #[test]
    fn tick_reprojects_the_latest_snapshot_from_the_current_pose() {
        let eye = Vec3::new(0.0, 1.6, 0.0);
        let (mut pump, snapshot_tx, _pose_rx, pool) = rig_with_target(Vec3::new(0.0, 1.6, 2.0));
        let _rx = pool.lock().activate(TargetId(0)).unwrap();

        // Snapshot was projected while the camera faced +z...
        let capture_pose = CameraPose {
            position: eye,
            orientation: Quat::IDENTITY,
            host_timestamp_ms: 1,
        };
        snapshot_tx
            .send(Some(project(&forward_raw(), &capture_pose)))
            .unwrap();

        // ...but a tick with the head yawed away must miss the target.
        let events = pump.tick(eye, Quat::from_rotation_y(FRAC_PI_2));
        assert!(events.is_empty());

        // Facing the target again, all three channel rays land.
        let events = pump.tick(eye, Quat::IDENTITY);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.outcome == DwellOutcome::Destroyed)
                .count(),
            1
        );
        assert_eq!(
            pool.lock().get(TargetId(0)).unwrap().state(),
            TargetState::Destroyed
        );
    }
}
