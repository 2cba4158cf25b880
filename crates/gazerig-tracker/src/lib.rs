pub mod projection;
pub mod simulate;
pub mod types;

pub use simulate::{FocusProvider, ReplaySource, SimulatedTracker};
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

/// A gaze sample producer. The device side of the pipeline: the real
/// hardware callback, the simulator, or a replay all sit behind this.
#[async_trait]
pub trait TrackerSource: Send + 'static {
    /// Resolve once the device is initialized and streaming. Readiness is
    /// a one-way latch; an error means the device is unusable.
    async fn wait_ready(&mut self) -> Result<()>;

    /// The next raw sample, at the device's own cadence. `None` ends the
    /// stream.
    async fn next_sample(&mut self) -> Option<RawGazeSample>;
}

/// Client for a gaze tracker.
///
/// Spawns the sampling task, projects each raw sample against the latest
/// camera pose, and publishes the result two ways: a `watch` channel
/// carrying the latest snapshot (frame consumers), and a per-sample sink
/// callback that observes every sample in order (the recorder).
pub struct TrackerClient {
    snapshot_rx: watch::Receiver<Option<GazeSnapshot>>,
    ready_rx: watch::Receiver<bool>,
    _task: tokio::task::JoinHandle<()>,
}

impl TrackerClient {
    pub fn spawn(
        source: impl TrackerSource,
        pose_rx: watch::Receiver<CameraPose>,
        sink: impl FnMut(&GazeSnapshot) + Send + 'static,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (ready_tx, ready_rx) = watch::channel(false);

        let task = tokio::spawn(sample_loop(source, snapshot_tx, ready_tx, pose_rx, sink));

        Self {
            snapshot_rx,
            ready_rx,
            _task: task,
        }
    }

    /// Latest projected snapshot (non-blocking). `None` until the first
    /// sample arrives.
    pub fn latest(&self) -> Option<GazeSnapshot> {
        *self.snapshot_rx.borrow()
    }

    /// Subscribe to the snapshot stream. Receivers observe the latest
    /// value; a slow consumer skips intermediate samples rather than
    /// lagging behind.
    pub fn snapshots(&self) -> watch::Receiver<Option<GazeSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to the readiness latch. Flips to `true` at most once.
    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready_rx.clone()
    }
}

/// Background task: wait for the device, then project and publish every
/// sample it produces.
async fn sample_loop<S, F>(
    mut source: S,
    snapshot_tx: watch::Sender<Option<GazeSnapshot>>,
    ready_tx: watch::Sender<bool>,
    pose_rx: watch::Receiver<CameraPose>,
    mut sink: F,
) where
    S: TrackerSource,
    F: FnMut(&GazeSnapshot) + Send + 'static,
{
    if let Err(e) = source.wait_ready().await {
        tracing::error!(?e, "Tracker failed to become ready");
        return;
    }
    let _ = ready_tx.send(true);
    tracing::info!("Tracker ready, streaming samples");

    let mut sample_count: u64 = 0;
    while let Some(raw) = source.next_sample().await {
        let pose = *pose_rx.borrow();
        let snapshot = projection::project(&raw, &pose);

        let _ = snapshot_tx.send(Some(snapshot));
        sink(&snapshot);

        sample_count += 1;
        if sample_count % 1000 == 0 {
            tracing::debug!(sample_count, "Gaze samples processed");
        }
    }

    tracing::warn!(sample_count, "Gaze stream ended");
}
