use crate::raycast::Raycaster;
use crate::target::{DwellOutcome, TargetId, TargetPool};
use gazerig_tracker::{GazeChannel, GazeRays};

/// One delivered dwell hit.
#[derive(Debug, Clone, Copy)]
pub struct DwellEvent {
    pub channel: GazeChannel,
    pub target: TargetId,
    pub outcome: DwellOutcome,
}

/// Cast the three channel rays and deliver a dwell hit for each one that
/// lands. All casts happen against the same pool state before anything is
/// delivered, so a target stared at by both eyes and the combined ray
/// receives up to three deliveries in one sweep; destruction stays
/// exactly-once because delivery is idempotent at the pool.
pub fn sweep(pool: &mut TargetPool, rays: &GazeRays) -> Vec<DwellEvent> {
    let casts = [
        (GazeChannel::Combined, rays.combined),
        (GazeChannel::Left, rays.left),
        (GazeChannel::Right, rays.right),
    ];

    let hits: Vec<(GazeChannel, TargetId)> = casts
        .iter()
        .filter_map(|(channel, ray)| pool.cast(ray).map(|hit| (*channel, hit.target)))
        .collect();

    hits.into_iter()
        .map(|(channel, target)| DwellEvent {
            channel,
            target,
            outcome: pool.dwell_hit(target),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Target, TargetState};
    use gazerig_tracker::Ray;
    use glam::{Quat, Vec3};

    fn rays_toward(point: Vec3) -> GazeRays {
        // Slightly separated eye origins, all looking at the same point.
        let left_origin = Vec3::new(-0.03, 0.0, 0.0);
        let right_origin = Vec3::new(0.03, 0.0, 0.0);
        GazeRays {
            left: Ray::new(left_origin, point - left_origin),
            right: Ray::new(right_origin, point - right_origin),
            combined: Ray::new(Vec3::ZERO, point),
        }
    }

    fn single_target_pool(position: Vec3) -> TargetPool {
        TargetPool::from_targets(vec![Target::new(
            TargetId(0),
            position,
            Quat::IDENTITY,
            0.15,
            [0.2, 0.4, 0.8],
        )])
    }

    #[test]
    fn all_three_channels_report_but_destruction_is_single() {
        let position = Vec3::new(0.0, 0.0, 2.0);
        let mut pool = single_target_pool(position);
        let mut rx = pool.activate(TargetId(0)).unwrap();

        let events = sweep(&mut pool, &rays_toward(position));

        assert_eq!(events.len(), 3);
        let destroyed = events
            .iter()
            .filter(|e| e.outcome == DwellOutcome::Destroyed)
            .count();
        assert_eq!(destroyed, 1);
        assert!(events.iter().all(|e| e.target == TargetId(0)));

        assert_eq!(rx.try_recv().unwrap(), TargetId(0));
        assert_eq!(pool.get(TargetId(0)).unwrap().state(), TargetState::Destroyed);
    }

    #[test]
    fn sweep_away_from_target_delivers_nothing() {
        let mut pool = single_target_pool(Vec3::new(0.0, 0.0, 2.0));
        let _rx = pool.activate(TargetId(0)).unwrap();

        let events = sweep(&mut pool, &rays_toward(Vec3::new(0.0, 0.0, -2.0)));
        assert!(events.is_empty());
        assert_eq!(pool.get(TargetId(0)).unwrap().state(), TargetState::Active);
    }

    #[test]
    fn dormant_target_is_never_swept() {
        let mut pool = single_target_pool(Vec3::new(0.0, 0.0, 2.0));
        let events = sweep(&mut pool, &rays_toward(Vec3::new(0.0, 0.0, 2.0)));
        assert!(events.is_empty());
    }

    #[test]
    fn zero_rays_are_inert() {
        let mut pool = single_target_pool(Vec3::new(0.0, 0.0, 2.0));
        let _rx = pool.activate(TargetId(0)).unwrap();

        let zero = Ray::new(Vec3::ZERO, Vec3::ZERO);
        let rays = GazeRays {
            left: zero,
            right: zero,
            combined: zero,
        };
        assert!(sweep(&mut pool, &rays).is_empty());
    }
}
