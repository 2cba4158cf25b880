use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Frame pump rate in Hz. Matches the headset refresh the probe would
    /// run at (90 Hz on the target hardware).
    pub frame_rate_hz: f64,
    /// Eye tracker configuration.
    pub tracker: TrackerConfig,
    /// Target formation layout.
    pub formation: FormationConfig,
    /// Data output configuration.
    pub output: OutputConfig,
    /// Session-level settings.
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: 90.0,
            tracker: TrackerConfig::default(),
            formation: FormationConfig::default(),
            output: OutputConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Gaze sample rate in Hz (the device callback cadence).
    pub sample_rate_hz: f64,
    /// Simulated tracker: delay before the device reports ready, in ms.
    pub startup_delay_ms: u64,
    /// Simulated tracker: fixation latency after a new target appears, in ms.
    pub acquire_delay_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 120.0,
            startup_delay_ms: 250,
            acquire_delay_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormationConfig {
    /// Center of the square formation (meters). Y is eye height.
    #[serde(with = "vec3_serde")]
    pub center: Vec3,
    /// Edge length of the square perimeter the targets sit on (meters).
    pub side_length: f32,
    /// Targets per side. Total target count is `4 * targets_per_side`.
    pub targets_per_side: u32,
    /// Uniform target edge length (meters).
    pub target_scale: f32,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, 1.6, 0.0),
            side_length: 3.6,
            targets_per_side: 4,
            target_scale: 0.15,
        }
    }
}

impl FormationConfig {
    /// Total number of targets in the formation.
    pub fn target_count(&self) -> u32 {
        4 * self.targets_per_side
    }

    /// Generate the target positions: `targets_per_side` points along each
    /// edge of the square perimeter, walked corner to corner so no position
    /// repeats.
    pub fn positions(&self) -> Vec<Vec3> {
        let half = self.side_length / 2.0;
        let step = self.side_length / self.targets_per_side.max(1) as f32;

        // Each side starts at a corner and walks toward the next one,
        // stopping short of it. (x, z) offsets from the formation center.
        let corners = [
            (half, half),
            (-half, half),
            (-half, -half),
            (half, -half),
        ];
        let walks = [(0.0, -1.0), (1.0, 0.0), (0.0, 1.0), (-1.0, 0.0)];

        corners
            .iter()
            .zip(walks.iter())
            .flat_map(|(&(cx, cz), &(wx, wz))| {
                (0..self.targets_per_side).map(move |i| {
                    let d = step * i as f32;
                    Vec3::new(cx + wx * d, 0.0, cz + wz * d)
                })
            })
            .map(|offset| self.center + offset)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory where per-trial CSV files are written.
    pub data_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("subj_data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// RNG seed for target selection and cosmetics. `None` = a fresh seed
    /// per session.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { seed: None }
    }
}

// Serde helper for glam Vec3 (which implements Serialize but we want
// a cleaner TOML representation as an array).

mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        let [x, y, z] = <[f32; 3]>::deserialize(d)?;
        Ok(Vec3::new(x, y, z))
    }
}
