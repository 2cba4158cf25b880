//! Pure projection from raw tracker samples to world-space gaze.
//!
//! The device reports origins in millimeters and directions in a frame
//! whose horizontal axis is mirrored relative to the scene. Projection
//! converts units, applies the mirror, and derives world rays from the
//! camera pose. No I/O, no shared state.

use crate::types::{
    CameraPose, ChannelGaze, EyeSample, GazeRays, GazeSnapshot, RawGazeSample, Ray, MM_TO_M,
};
use glam::Vec3;

/// Flip the horizontal axis. The sensor frame and the scene frame disagree
/// on the sign of x; applied to directions only, origins keep the device
/// convention.
pub fn mirror_x(v: Vec3) -> Vec3 {
    Vec3::new(-v.x, v.y, v.z)
}

fn project_channel(eye: &EyeSample) -> ChannelGaze {
    ChannelGaze {
        origin: eye.origin_mm * MM_TO_M,
        direction: mirror_x(eye.direction),
        valid: eye.origin_valid(),
    }
}

fn world_ray(pose: &CameraPose, local_direction: Vec3) -> Ray {
    // Rays originate at the camera, not at the per-eye origins.
    Ray::new(pose.position, pose.orientation * local_direction)
}

/// Project a raw sample against the given camera pose.
pub fn project(raw: &RawGazeSample, pose: &CameraPose) -> GazeSnapshot {
    let left = project_channel(&raw.left);
    let right = project_channel(&raw.right);
    let combined = project_channel(&raw.combined);

    GazeSnapshot {
        device_timestamp_ms: raw.timestamp_ms,
        pose: *pose,
        left,
        right,
        combined,
        pupil_left_mm: raw.left.pupil_diameter_mm,
        pupil_right_mm: raw.right.pupil_diameter_mm,
        rays: GazeRays {
            left: world_ray(pose, left.direction),
            right: world_ray(pose, right.direction),
            combined: world_ray(pose, combined.direction),
        },
    }
}

impl GazeSnapshot {
    /// Recompute world rays against a fresh camera pose. Used by the frame
    /// pump, which runs on a different clock than the sample stream and
    /// must aim the latest sample from wherever the camera is now.
    pub fn rays_at(&self, pose: &CameraPose) -> GazeRays {
        GazeRays {
            left: world_ray(pose, self.left.direction),
            right: world_ray(pose, self.right.direction),
            combined: world_ray(pose, self.combined.direction),
        }
    }
}
