use crate::SessionError;
use gazerig_config::{FormationConfig, SessionConfig};
use gazerig_recorder::{SampleRecorder, TrialLog};
use gazerig_scene::{SharedPool, TargetId, TargetPool};
use tokio::sync::watch;
use tracing::info;

/// Where the session currently is. Published on a watch channel so any
/// observer (UI, tests) can follow along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the tracker readiness latch.
    Initializing,
    /// Pool built, no trial running yet.
    PoolReady,
    /// One target active, recorder armed.
    TrialActive { trial: u32 },
    /// Pool exhausted.
    Complete,
}

/// One finished trial.
#[derive(Debug)]
pub struct TrialOutcome {
    pub target: TargetId,
    pub log: TrialLog,
}

#[derive(Debug)]
pub struct SessionSummary {
    pub trials: Vec<TrialOutcome>,
}

/// Drives the whole session: build the pool once the tracker is ready,
/// then repeatedly present a random remaining target with the recorder
/// armed around it, until the pool runs dry.
pub struct TrialSequencer {
    pool: SharedPool,
    recorder: SampleRecorder,
    ready_rx: watch::Receiver<bool>,
    formation: FormationConfig,
    rng: fastrand::Rng,
    phase_tx: watch::Sender<SessionPhase>,
    phase_rx: watch::Receiver<SessionPhase>,
}

impl TrialSequencer {
    pub fn new(
        pool: SharedPool,
        recorder: SampleRecorder,
        ready_rx: watch::Receiver<bool>,
        formation: FormationConfig,
        session: &SessionConfig,
    ) -> Self {
        let rng = match session.seed {
            Some(seed) => {
                info!(seed, "Session RNG seeded");
                fastrand::Rng::with_seed(seed)
            }
            None => fastrand::Rng::new(),
        };
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Initializing);
        Self {
            pool,
            recorder,
            ready_rx,
            formation,
            rng,
            phase_tx,
            phase_rx,
        }
    }

    /// Subscribe to phase transitions.
    pub fn phases(&self) -> watch::Receiver<SessionPhase> {
        self.phase_rx.clone()
    }

    fn set_phase(&self, phase: SessionPhase) {
        let _ = self.phase_tx.send(phase);
    }

    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        info!("Waiting for tracker");
        self.ready_rx
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| SessionError::TrackerGone)?;

        {
            let mut pool = self.pool.lock();
            *pool = TargetPool::from_config(&self.formation, &mut self.rng);
            info!(targets = pool.len(), "Target pool built");
        }
        self.set_phase(SessionPhase::PoolReady);

        let mut trials = Vec::new();
        let mut trial: u32 = 0;

        loop {
            // Draw without replacement: selection over whatever is left.
            let (id, destroyed_rx) = {
                let mut pool = self.pool.lock();
                let remaining = pool.remaining();
                if remaining.is_empty() {
                    break;
                }
                let id = remaining[self.rng.usize(..remaining.len())];
                let rx = pool.activate(id)?;
                (id, rx)
            };

            self.recorder.arm(trial)?;
            self.set_phase(SessionPhase::TrialActive { trial });
            info!(trial, target = %id, "Trial started");

            // Cooperative wait on destruction; resumes exactly once. No
            // timeout: a target nobody destroys stalls the session, which
            // is an experimental concern, not a fault here.
            destroyed_rx
                .await
                .map_err(|_| SessionError::TargetVanished { trial })?;

            let log = self.recorder.disarm()?;
            info!(trial, target = %id, samples = log.samples, "Trial complete");

            self.pool.lock().remove(id)?;
            trials.push(TrialOutcome { target: id, log });
            trial += 1;
        }

        self.set_phase(SessionPhase::Complete);
        info!(trials = trials.len(), "Session complete");
        Ok(SessionSummary { trials })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_rig(
        targets_per_side: u32,
        seed: u64,
    ) -> (TrialSequencer, SharedPool, watch::Sender<bool>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let recorder = SampleRecorder::create(dir.path().join("out")).unwrap();
        let pool = TargetPool::empty().into_shared();
        let (ready_tx, ready_rx) = watch::channel(false);
        let formation = FormationConfig {
            targets_per_side,
            ..FormationConfig::default()
        };
        let session = SessionConfig { seed: Some(seed) };
        let sequencer = TrialSequencer::new(pool.clone(), recorder, ready_rx, formation, &session);
        (sequencer, pool, ready_tx, dir)
    }

    /// Destroys whichever target is active, delivering the dwell hit the
    /// probe would.
    fn spawn_destroyer(pool: SharedPool) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let id = pool.lock().active_target().map(|t| t.id);
                if let Some(id) = id {
                    pool.lock().dwell_hit(id);
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    }

    #[tokio::test]
    async fn runs_every_target_exactly_once() {
        let (sequencer, pool, ready_tx, _dir) = test_rig(1, 5);
        let mut phases = sequencer.phases();
        assert_eq!(*phases.borrow_and_update(), SessionPhase::Initializing);

        let destroyer = spawn_destroyer(pool.clone());
        ready_tx.send(true).unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(10), sequencer.run())
            .await
            .expect("session stalled")
            .unwrap();
        destroyer.abort();

        assert_eq!(summary.trials.len(), 4);
        assert_eq!(*phases.borrow_and_update(), SessionPhase::Complete);
        assert!(pool.lock().is_empty());

        // No target repeats, trial indices are sequential, logs exist.
        let mut seen: Vec<u32> = summary.trials.iter().map(|t| t.target.0).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4);
        for (i, outcome) in summary.trials.iter().enumerate() {
            assert_eq!(outcome.log.trial, i as u32);
            assert!(outcome.log.path.exists());
        }
    }

    #[tokio::test]
    async fn same_seed_gives_same_presentation_order() {
        let mut orders = Vec::new();
        for _ in 0..2 {
            let (sequencer, pool, ready_tx, _dir) = test_rig(1, 99);
            let destroyer = spawn_destroyer(pool);
            ready_tx.send(true).unwrap();
            let summary = tokio::time::timeout(Duration::from_secs(10), sequencer.run())
                .await
                .expect("session stalled")
                .unwrap();
            destroyer.abort();
            orders.push(
                summary
                    .trials
                    .iter()
                    .map(|t| t.target.0)
                    .collect::<Vec<_>>(),
            );
        }
        assert_eq!(orders[0], orders[1]);
    }

    #[tokio::test]
    async fn empty_formation_completes_immediately() {
        let (sequencer, _pool, ready_tx, _dir) = test_rig(0, 1);
        ready_tx.send(true).unwrap();

        let summary = sequencer.run().await.unwrap();
        assert!(summary.trials.is_empty());
    }

    #[tokio::test]
    async fn dropped_ready_channel_fails_the_session() {
        let (sequencer, _pool, ready_tx, _dir) = test_rig(1, 1);
        drop(ready_tx);

        assert!(matches!(
            sequencer.run().await,
            Err(SessionError::TrackerGone)
        ));
    }

    #[tokio::test]
    async fn removed_active_target_aborts_the_session() {
        let (sequencer, pool, ready_tx, _dir) = test_rig(1, 1);
        ready_tx.send(true).unwrap();

        // Yank the active target out from under the trial instead of
        // destroying it.
        let saboteur_pool = pool.clone();
        let saboteur = tokio::spawn(async move {
            loop {
                let id = saboteur_pool.lock().active_target().map(|t| t.id);
                if let Some(id) = id {
                    saboteur_pool.lock().remove(id).unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        let result = tokio::time::timeout(Duration::from_secs(10), sequencer.run())
            .await
            .expect("session stalled");
        saboteur.await.unwrap();

        assert!(matches!(
            result,
            Err(SessionError::TargetVanished { trial: 0 })
        ));
    }
}
