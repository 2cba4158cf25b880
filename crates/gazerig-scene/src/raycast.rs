use crate::target::TargetId;
use gazerig_tracker::Ray;
use glam::{Quat, Vec3};

/// Result of casting a ray into the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub target: TargetId,
    /// Distance from the ray origin to the entry point, meters.
    pub distance: f32,
}

/// Anything gaze rays can be cast into. The collision probe consumes the
/// scene through this seam only, so a physics engine could stand in for
/// the built-in intersector.
pub trait Raycaster {
    fn cast(&self, ray: &Ray) -> Option<RayHit>;
}

/// Ray vs oriented box, slab test in the box's local frame.
///
/// `half_extent` is half the edge length of the cube. Returns the entry
/// distance along the ray; a ray starting inside the box reports 0.
pub fn ray_obb_distance(ray: &Ray, center: Vec3, rotation: Quat, half_extent: f32) -> Option<f32> {
    if ray.direction == Vec3::ZERO {
        return None;
    }

    let inv_rot = rotation.inverse();
    let origin = (inv_rot * (ray.origin - center)).to_array();
    let dir = (inv_rot * ray.direction).to_array();

    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for i in 0..3 {
        if dir[i].abs() < 1e-8 {
            // Parallel to this slab: must already be inside it.
            if origin[i].abs() > half_extent {
                return None;
            }
        } else {
            let inv = 1.0 / dir[i];
            let mut t0 = (-half_extent - origin[i]) * inv;
            let mut t1 = (half_extent - origin[i]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
    }

    if t_max < 0.0 {
        // Box entirely behind the ray.
        return None;
    }

    Some(t_min.max(0.0))
}
