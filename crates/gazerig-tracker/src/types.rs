use glam::{Quat, Vec3};
use std::time::{SystemTime, UNIX_EPOCH};

/// Millimeters to meters. Tracker origins arrive in mm, the scene is in m.
pub const MM_TO_M: f32 = 0.001;

/// Which gaze stream a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeChannel {
    Left,
    Right,
    /// Vergence-combined ray derived by the device from both eyes.
    Combined,
}

/// Bit indices of the per-eye validity bitfield reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeValidity {
    Origin = 0,
    Direction = 1,
    PupilDiameter = 2,
    Openness = 3,
    PupilPosition = 4,
}

impl GazeValidity {
    pub fn bit(self) -> u64 {
        1 << (self as u64)
    }

    /// Mask with every validity bit set.
    pub fn full_mask() -> u64 {
        0x1F
    }
}

/// One eye's reading within a raw sample, in tracker-local coordinates.
#[derive(Debug, Clone, Copy)]
pub struct EyeSample {
    /// Gaze origin in millimeters, tracker-local.
    pub origin_mm: Vec3,
    /// Unit gaze direction in the sensor's native convention. The sensor
    /// reports a horizontally mirrored frame relative to the scene.
    pub direction: Vec3,
    /// Pupil diameter in millimeters. `-1.0` while tracking is dropped.
    pub pupil_diameter_mm: f32,
    /// Validity bitfield, indexed by [`GazeValidity`].
    pub validity_mask: u64,
}

impl EyeSample {
    pub fn valid(&self, bit: GazeValidity) -> bool {
        self.validity_mask & bit.bit() != 0
    }

    /// The validity this pipeline trusts: the gaze origin bit.
    pub fn origin_valid(&self) -> bool {
        self.valid(GazeValidity::Origin)
    }
}

impl Default for EyeSample {
    fn default() -> Self {
        Self {
            origin_mm: Vec3::ZERO,
            direction: Vec3::ZERO,
            pupil_diameter_mm: -1.0,
            validity_mask: 0,
        }
    }
}

/// One device callback payload: both eyes plus the combined ray.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawGazeSample {
    /// Device monotonic clock, milliseconds. Not comparable to host time.
    pub timestamp_ms: i64,
    pub left: EyeSample,
    pub right: EyeSample,
    pub combined: EyeSample,
}

/// Camera pose at a frame tick, with the host clock it was stamped at.
#[derive(Debug, Clone, Copy)]
pub struct CameraPose {
    /// World position in meters.
    pub position: Vec3,
    /// World orientation.
    pub orientation: Quat,
    /// Unix milliseconds on the host when this pose was captured.
    pub host_timestamp_ms: i64,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            host_timestamp_ms: 0,
        }
    }
}

/// A world-space ray. Direction is normalized at construction; a zero
/// input stays zero and never intersects anything.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Point at parameter `t` along the ray.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// World rays for the three gaze channels.
#[derive(Debug, Clone, Copy)]
pub struct GazeRays {
    pub left: Ray,
    pub right: Ray,
    pub combined: Ray,
}

/// One channel of a projected snapshot. Origins are tracker-local meters,
/// directions are tracker-local with the horizontal mirror applied. These
/// are the values the recorder logs; world rays are derived separately.
#[derive(Debug, Clone, Copy)]
pub struct ChannelGaze {
    pub origin: Vec3,
    pub direction: Vec3,
    pub valid: bool,
}

/// An immutable projected gaze sample. Built once per device callback and
/// published whole; consumers never see a partially updated sample.
#[derive(Debug, Clone, Copy)]
pub struct GazeSnapshot {
    /// Device clock of the underlying raw sample.
    pub device_timestamp_ms: i64,
    /// Camera pose the snapshot was projected with (carries the host clock).
    pub pose: CameraPose,
    pub left: ChannelGaze,
    pub right: ChannelGaze,
    pub combined: ChannelGaze,
    pub pupil_left_mm: f32,
    pub pupil_right_mm: f32,
    /// World rays computed from `pose` at construction.
    pub rays: GazeRays,
}

/// Current host time as Unix milliseconds.
pub fn host_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
