use anyhow::Result;
use gazerig_recorder::SampleRecorder;
use gazerig_scene::{DwellOutcome, TargetPool};
use gazerig_session::{ActiveTargetFocus, FramePump, TrialSequencer};
use gazerig_tracker::{CameraPose, FocusProvider, SimulatedTracker, TrackerClient};
use glam::{Quat, Vec3};
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How fast the simulated head turns toward the gaze point, rad/s.
const HEAD_TURN_RATE: f32 = 2.5;

/// Stand-in for the headset pose feed: a camera fixed at eye height that
/// smoothly yaws toward wherever the subject is looking.
struct SimCamera {
    position: Vec3,
    yaw: f32,
}

impl SimCamera {
    fn new(position: Vec3) -> Self {
        Self { position, yaw: 0.0 }
    }

    fn update(&mut self, focus: Option<Vec3>, dt: f32) -> Quat {
        if let Some(point) = focus {
            let to = point - self.position;
            let desired = to.x.atan2(to.z);
            let delta = wrap_angle(desired - self.yaw);
            let max_step = HEAD_TURN_RATE * dt;
            self.yaw = wrap_angle(self.yaw + delta.clamp(-max_step, max_step));
        }
        Quat::from_rotation_y(self.yaw)
    }
}

fn wrap_angle(a: f32) -> f32 {
    (a + PI).rem_euclid(2.0 * PI) - PI
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gazerig_app=info,gazerig_tracker=info,gazerig_scene=info,gazerig_recorder=info,gazerig_session=info".into()
            }),
        )
        .init();

    info!("Gaze sampling rig starting");

    // A missing config file yields defaults; a present but unparseable
    // one aborts startup rather than running the wrong experiment.
    let config = gazerig_config::load_config()?;
    if let Ok(path) = gazerig_config::config_path() {
        if !path.exists() {
            if let Err(e) = gazerig_config::save_config(&config) {
                warn!(?e, "Failed to write default config");
            }
        }
    }
    info!(
        targets = config.formation.target_count(),
        data_dir = ?config.output.data_dir,
        "Config loaded"
    );

    let recorder = SampleRecorder::create(config.output.data_dir.clone())?;
    let pool = TargetPool::empty().into_shared();

    // Pose flows pump -> tracker; snapshots flow back through the client.
    let (pose_tx, pose_rx) = watch::channel(CameraPose {
        position: config.formation.center,
        ..CameraPose::default()
    });

    let focus = Arc::new(ActiveTargetFocus::new(pool.clone()));
    let source = SimulatedTracker::new(&config.tracker, focus.clone(), pose_rx.clone());

    let sink_recorder = recorder.clone();
    let client = TrackerClient::spawn(source, pose_rx, move |snapshot| {
        // Write failures are logged by the recorder and resurface at
        // disarm; the sample loop itself never stops for them.
        let _ = sink_recorder.append(snapshot);
    });

    let sequencer = TrialSequencer::new(
        pool.clone(),
        recorder,
        client.ready_signal(),
        config.formation.clone(),
        &config.session,
    );

    // Headless frame loop standing in for the renderer's per-frame hook.
    let mut pump = FramePump::new(client.snapshots(), pose_tx, pool);
    let frame_period = Duration::from_secs_f64(1.0 / config.frame_rate_hz.max(1.0));
    let mut camera = SimCamera::new(config.formation.center);
    let pump_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(frame_period);
        loop {
            ticker.tick().await;
            let orientation = camera.update(focus.focus_point(), frame_period.as_secs_f32());
            for event in pump.tick(camera.position, orientation) {
                if event.outcome == DwellOutcome::Destroyed {
                    debug!(target = %event.target, channel = ?event.channel, "Dwell hit");
                }
            }
        }
    });

    let outcome = tokio::select! {
        result = sequencer.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    pump_task.abort();

    match outcome {
        Some(Ok(summary)) => {
            info!(trials = summary.trials.len(), "Session finished");
            for trial in &summary.trials {
                info!(
                    trial = trial.log.trial,
                    target = %trial.target,
                    samples = trial.log.samples,
                    path = ?trial.log.path,
                    "Trial log"
                );
            }
        }
        Some(Err(e)) => {
            error!(?e, "Session failed");
            return Err(e.into());
        }
        None => warn!("Interrupted, shutting down"),
    }

    Ok(())
}
