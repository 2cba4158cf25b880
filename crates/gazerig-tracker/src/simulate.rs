//! Hardware-free gaze sources.
//!
//! `SimulatedTracker` behaves like the real device: it comes up after a
//! startup delay, then emits samples at the configured rate, fixating on
//! whatever the [`FocusProvider`] reports after a short acquisition lag.
//! `ReplaySource` feeds a prepared sample list at a fixed cadence.

use crate::projection::mirror_x;
use crate::types::{CameraPose, EyeSample, GazeValidity, RawGazeSample};
use crate::TrackerSource;
use anyhow::Result;
use async_trait::async_trait;
use gazerig_config::TrackerConfig;
use glam::Vec3;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Where the simulated subject is looking, in world space. `None` means
/// nothing to look at (gaze drifts straight ahead).
pub trait FocusProvider: Send + Sync {
    fn focus_point(&self) -> Option<Vec3>;
}

/// Fixed eye origins in tracker millimeters (half-IPD apart, behind the
/// lens reference plane).
const LEFT_ORIGIN_MM: Vec3 = Vec3::new(-31.5, 0.0, -39.0);
const RIGHT_ORIGIN_MM: Vec3 = Vec3::new(31.5, 0.0, -39.0);
const COMBINED_ORIGIN_MM: Vec3 = Vec3::new(0.0, 0.0, -39.0);

const PUPIL_DIAMETER_MM: f32 = 3.5;

pub struct SimulatedTracker {
    sample_period: Duration,
    startup_delay: Duration,
    acquire_delay: Duration,
    focus: Arc<dyn FocusProvider>,
    pose_rx: watch::Receiver<CameraPose>,
    /// Device clock zero.
    epoch: Instant,
    ticker: Option<tokio::time::Interval>,
    current_focus: Option<Vec3>,
    focus_since: Instant,
}

impl SimulatedTracker {
    pub fn new(
        config: &TrackerConfig,
        focus: Arc<dyn FocusProvider>,
        pose_rx: watch::Receiver<CameraPose>,
    ) -> Self {
        let now = Instant::now();
        Self {
            sample_period: Duration::from_secs_f64(1.0 / config.sample_rate_hz.max(1.0)),
            startup_delay: Duration::from_millis(config.startup_delay_ms),
            acquire_delay: Duration::from_millis(config.acquire_delay_ms),
            focus,
            pose_rx,
            epoch: now,
            ticker: None,
            current_focus: None,
            focus_since: now,
        }
    }

    /// Track focus changes so the acquisition delay restarts whenever the
    /// subject is given a new point to find.
    fn update_focus(&mut self) {
        let focus = self.focus.focus_point();
        if focus != self.current_focus {
            self.current_focus = focus;
            self.focus_since = Instant::now();
        }
    }

    /// Gaze direction in the sensor's native (mirrored) frame.
    fn sensor_direction(&self, pose: &CameraPose) -> Vec3 {
        let acquired = self.focus_since.elapsed() >= self.acquire_delay;
        match self.current_focus {
            Some(point) if acquired => {
                let world = (point - pose.position).normalize_or_zero();
                if world == Vec3::ZERO {
                    Vec3::Z
                } else {
                    mirror_x(pose.orientation.inverse() * world)
                }
            }
            _ => Vec3::Z,
        }
    }
}

#[async_trait]
impl TrackerSource for SimulatedTracker {
    async fn wait_ready(&mut self) -> Result<()> {
        tokio::time::sleep(self.startup_delay).await;
        tracing::info!(
            period_us = self.sample_period.as_micros() as u64,
            "Simulated tracker ready"
        );
        Ok(())
    }

    async fn next_sample(&mut self) -> Option<RawGazeSample> {
        let period = self.sample_period;
        let ticker = self
            .ticker
            .get_or_insert_with(|| tokio::time::interval(period));
        ticker.tick().await;

        self.update_focus();
        let pose = *self.pose_rx.borrow();
        let direction = self.sensor_direction(&pose);

        let eye = |origin_mm| EyeSample {
            origin_mm,
            direction,
            pupil_diameter_mm: PUPIL_DIAMETER_MM,
            validity_mask: GazeValidity::full_mask(),
        };

        Some(RawGazeSample {
            timestamp_ms: self.epoch.elapsed().as_millis() as i64,
            left: eye(LEFT_ORIGIN_MM),
            right: eye(RIGHT_ORIGIN_MM),
            combined: eye(COMBINED_ORIGIN_MM),
        })
    }
}

/// Plays back a prepared sample list at a fixed cadence, then ends the
/// stream. Development and test source.
pub struct ReplaySource {
    samples: VecDeque<RawGazeSample>,
    period: Duration,
    ticker: Option<tokio::time::Interval>,
}

impl ReplaySource {
    pub fn new(samples: Vec<RawGazeSample>, sample_rate_hz: f64) -> Self {
        Self {
            samples: samples.into(),
            period: Duration::from_secs_f64(1.0 / sample_rate_hz.max(1.0)),
            ticker: None,
        }
    }
}

#[async_trait]
impl TrackerSource for ReplaySource {
    async fn wait_ready(&mut self) -> Result<()> {
        Ok(())
    }

    async fn next_sample(&mut self) -> Option<RawGazeSample> {
        let period = self.period;
        let ticker = self
            .ticker
            .get_or_insert_with(|| tokio::time::interval(period));
        ticker.tick().await;
        self.samples.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::project;
    use glam::Quat;

    struct FixedFocus(Vec3);

    impl FocusProvider for FixedFocus {
        fn focus_point(&self) -> Option<Vec3> {
            Some(self.0)
        }
    }

    struct NoFocus;

    impl FocusProvider for NoFocus {
        fn focus_point(&self) -> Option<Vec3> {
            None
        }
    }

    fn fast_config(acquire_delay_ms: u64) -> TrackerConfig {
        TrackerConfig {
            sample_rate_hz: 2000.0,
            startup_delay_ms: 0,
            acquire_delay_ms,
        }
    }

    fn eye_pose() -> CameraPose {
        CameraPose {
            position: Vec3::new(0.0, 1.6, 0.0),
            orientation: Quat::IDENTITY,
            host_timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn fixates_on_focus_point_once_acquired() {
        let target = Vec3::new(1.8, 1.6, 1.8);
        let (_pose_tx, pose_rx) = watch::channel(eye_pose());
        let mut source =
            SimulatedTracker::new(&fast_config(0), Arc::new(FixedFocus(target)), pose_rx);

        source.wait_ready().await.unwrap();
        let raw = source.next_sample().await.unwrap();

        // Projecting with the same pose must land the ray on the target.
        let snap = project(&raw, &eye_pose());
        let expected = (target - eye_pose().position).normalize();
        assert!((snap.rays.combined.direction - expected).length() < 1e-5);
        assert!(snap.combined.valid);
    }

    #[tokio::test]
    async fn drifts_forward_while_acquiring() {
        let target = Vec3::new(1.8, 1.6, 1.8);
        let (_pose_tx, pose_rx) = watch::channel(eye_pose());
        let mut source =
            SimulatedTracker::new(&fast_config(60_000), Arc::new(FixedFocus(target)), pose_rx);

        let raw = source.next_sample().await.unwrap();
        let snap = project(&raw, &eye_pose());
        assert!((snap.rays.combined.direction - Vec3::Z).length() < 1e-6);
    }

    #[tokio::test]
    async fn drifts_forward_with_nothing_to_look_at() {
        let (_pose_tx, pose_rx) = watch::channel(eye_pose());
        let mut source = SimulatedTracker::new(&fast_config(0), Arc::new(NoFocus), pose_rx);

        let raw = source.next_sample().await.unwrap();
        assert!((raw.combined.direction - Vec3::Z).length() < 1e-6);
        assert!(raw.combined.origin_valid());
    }

    #[tokio::test]
    async fn device_timestamps_never_decrease() {
        let (_pose_tx, pose_rx) = watch::channel(eye_pose());
        let mut source = SimulatedTracker::new(&fast_config(0), Arc::new(NoFocus), pose_rx);

        let mut last = -1;
        for _ in 0..5 {
            let raw = source.next_sample().await.unwrap();
            assert!(raw.timestamp_ms >= last);
            last = raw.timestamp_ms;
        }
    }

    #[tokio::test]
    async fn replay_ends_stream_after_queue_drains() {
        let samples = vec![RawGazeSample::default(), RawGazeSample::default()];
        let mut source = ReplaySource::new(samples, 2000.0);

        source.wait_ready().await.unwrap();
        assert!(source.next_sample().await.is_some());
        assert!(source.next_sample().await.is_some());
        assert!(source.next_sample().await.is_none());
    }
}
