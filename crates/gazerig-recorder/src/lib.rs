use gazerig_tracker::{ChannelGaze, GazeSnapshot};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recorder already armed for trial {0}")]
    AlreadyArmed(u32),
    #[error("recorder is not armed")]
    NotArmed,
    #[error("trial {trial} log failed")]
    TrialFailed {
        trial: u32,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Summary of one closed trial log.
#[derive(Debug)]
pub struct TrialLog {
    pub trial: u32,
    pub path: PathBuf,
    pub samples: u64,
}

struct TrialSink {
    writer: BufWriter<File>,
    path: PathBuf,
    trial: u32,
    samples: u64,
}

struct Inner {
    dir: PathBuf,
    sink: Option<TrialSink>,
    /// First write failure of the current trial, held for `disarm`.
    failed: Option<(u32, io::Error)>,
}

/// Per-trial CSV sample sink.
///
/// A cloneable handle: the tracker task appends through one clone while
/// the sequencer arms and disarms through another. At most one trial owns
/// the recorder at a time; arming over a live trial fails loudly instead
/// of silently swapping streams.
#[derive(Clone)]
pub struct SampleRecorder {
    inner: Arc<Mutex<Inner>>,
}

impl SampleRecorder {
    /// Create a recorder writing into `dir`, creating the directory if
    /// missing. Called once at session startup.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(?dir, "Sample recorder ready");
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                dir,
                sink: None,
                failed: None,
            })),
        })
    }

    /// Open `trial_<n>.csv` and start accepting samples.
    pub fn arm(&self, trial: u32) -> Result<PathBuf, RecorderError> {
        let mut inner = self.inner.lock();
        if let Some(sink) = &inner.sink {
            return Err(RecorderError::AlreadyArmed(sink.trial));
        }
        if let Some((failed_trial, _)) = &inner.failed {
            return Err(RecorderError::AlreadyArmed(*failed_trial));
        }

        let path = inner.dir.join(format!("trial_{trial}.csv"));
        let file = File::create(&path)?;
        inner.sink = Some(TrialSink {
            writer: BufWriter::new(file),
            path: path.clone(),
            trial,
            samples: 0,
        });
        info!(trial, ?path, "Recorder armed");
        Ok(path)
    }

    /// Append one sample. `Ok(false)` when no trial is armed: the sample
    /// stream keeps running between trials and those samples are simply
    /// not logged. The first write failure drops the sink and is reported
    /// again by `disarm`; later appends return `Ok(false)`.
    pub fn append(&self, snapshot: &GazeSnapshot) -> Result<bool, RecorderError> {
        let mut inner = self.inner.lock();

        let line = format_record(snapshot);
        let (trial, err) = {
            let Some(sink) = inner.sink.as_mut() else {
                return Ok(false);
            };
            match writeln!(sink.writer, "{line}") {
                Ok(()) => {
                    sink.samples += 1;
                    return Ok(true);
                }
                Err(e) => (sink.trial, e),
            }
        };

        let kind = err.kind();
        let msg = err.to_string();
        error!(trial, error = %msg, "Sample write failed, dropping trial sink");
        inner.sink = None;
        inner.failed = Some((trial, err));
        Err(RecorderError::TrialFailed {
            trial,
            source: io::Error::new(kind, msg),
        })
    }

    /// Flush and close the current trial log. Surfaces a mid-trial write
    /// failure here so the trial fails loudly rather than producing a
    /// silently truncated file.
    pub fn disarm(&self) -> Result<TrialLog, RecorderError> {
        let mut inner = self.inner.lock();

        if let Some((trial, source)) = inner.failed.take() {
            return Err(RecorderError::TrialFailed { trial, source });
        }

        let mut sink = inner.sink.take().ok_or(RecorderError::NotArmed)?;
        if let Err(e) = sink.writer.flush() {
            return Err(RecorderError::TrialFailed {
                trial: sink.trial,
                source: e,
            });
        }

        info!(
            trial = sink.trial,
            samples = sink.samples,
            path = ?sink.path,
            "Trial log closed"
        );
        Ok(TrialLog {
            trial: sink.trial,
            path: sink.path,
            samples: sink.samples,
        })
    }

    /// Whether a trial currently owns the recorder. A trial whose writes
    /// failed keeps ownership until `disarm` collects the failure.
    pub fn is_armed(&self) -> bool {
        let inner = self.inner.lock();
        inner.sink.is_some() || inner.failed.is_some()
    }
}

fn push_vec3(line: &mut String, v: glam::Vec3) {
    let _ = write!(line, ",{},{},{}", v.x, v.y, v.z);
}

fn push_channel(line: &mut String, ch: &ChannelGaze) {
    push_vec3(line, ch.origin);
    push_vec3(line, ch.direction);
}

/// One sample as a CSV line (no trailing newline), 32 fields:
/// timestamps, camera pose, combined/left/right origin and direction,
/// pupil diameters, validity flags. Rust's float `Display` is
/// locale-independent and round-trips exactly, so the decimal separator
/// is always `.` regardless of process locale.
pub fn format_record(s: &GazeSnapshot) -> String {
    let mut line = String::with_capacity(256);

    let _ = write!(line, "{},{}", s.device_timestamp_ms, s.pose.host_timestamp_ms);
    push_vec3(&mut line, s.pose.position);
    let q = s.pose.orientation;
    let _ = write!(line, ",{},{},{},{}", q.x, q.y, q.z, q.w);

    push_channel(&mut line, &s.combined);
    push_channel(&mut line, &s.left);
    push_channel(&mut line, &s.right);

    let _ = write!(line, ",{},{}", s.pupil_left_mm, s.pupil_right_mm);
    let _ = write!(
        line,
        ",{},{},{}",
        s.combined.valid, s.left.valid, s.right.valid
    );

    line
}
