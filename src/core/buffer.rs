//! Rolling time-series window with counter-driven persistence.
//!
//! The buffer holds the most recent `window_secs * sample_rate` samples of a
//! multi-channel stream. A fill counter tracks how many more samples are
//! needed before the window contains only data that has never been persisted;
//! each time the counter crosses zero the entire window is appended to the
//! recording sink and the counter restarts. Chunks may straddle a crossing,
//! so appends run in two phases around the flush point.
//!
//! All state sits behind one lock. Readers never block writers for long:
//! `snapshot` copies the window out, and the update signal is a version
//! counter with a condvar broadcast, so any number of readers can follow
//! updates without stealing each other's wakeups.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ring::{Sample, SampleRing};
use crate::record::{RecordError, RecordingSink};

/// Default rolling window length in seconds.
pub const DEFAULT_WINDOW_SECS: f64 = 10.0;

/// Errors raised by [`TimeSeriesBuffer`] operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The window has not been allocated yet; call `initialize()` first.
    #[error("buffer window is not initialized")]
    NotInitialized,

    #[error("window of {0} s at {1} Hz holds no samples")]
    InvalidWindow(f64, f64),

    #[error("chunk shape mismatch: {0} timestamps but {1} sample rows")]
    ChunkLengthMismatch(usize, usize),

    #[error("channel count mismatch: expected {0} values per sample, got {1}")]
    ChannelCountMismatch(usize, usize),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Where (and whether) filled windows are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RecordingMode {
    /// Keep the window in memory only.
    Disabled,
    /// Auto-named `timeseries_<date>_<label>.csv` under `data_dir`. With no
    /// explicit label the smallest unused integer for the day is chosen.
    AutoNamed {
        data_dir: PathBuf,
        #[serde(default)]
        label: Option<u64>,
    },
    /// Append to an explicit file path.
    File { path: PathBuf },
}

/// Construction parameters for a [`TimeSeriesBuffer`].
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Ordered channel names; fixes the channel arity of every sample.
    pub channel_names: Vec<String>,
    /// Nominal sample rate in Hz.
    pub sample_rate: f64,
    /// Rolling window length in seconds. Capacity is the floor of
    /// `window_secs * sample_rate`, so the stored span is approximate.
    pub window_secs: f64,
    /// Destination for filled windows.
    pub recording: RecordingMode,
}

impl BufferConfig {
    pub fn new(channel_names: Vec<String>, sample_rate: f64) -> Self {
        Self {
            channel_names,
            sample_rate,
            window_secs: DEFAULT_WINDOW_SECS,
            recording: RecordingMode::Disabled,
        }
    }
}

struct Inner {
    window: Option<SampleRing>,
    fill_counter: i64,
    sink: Option<RecordingSink>,
}

/// Thread-safe rolling window over a live multi-channel stream.
///
/// The buffer starts uninitialized: `new` opens the recording sink so a bad
/// destination fails fast, and `initialize` allocates the zero-filled window.
/// Writers call `append_chunk`; readers call `snapshot` and may block on
/// `wait_for_update` to follow the stream without polling.
pub struct TimeSeriesBuffer {
    channel_names: Vec<String>,
    sample_rate: f64,
    capacity: usize,
    inner: Mutex<Inner>,
    update_cond: Condvar,
    version: AtomicU64,
}

impl TimeSeriesBuffer {
    /// Validate the window shape and open the recording sink.
    ///
    /// Fails if the window would hold less than one sample or if the
    /// recording destination cannot be opened.
    pub fn new(config: BufferConfig) -> Result<Self, BufferError> {
        let capacity = (config.window_secs * config.sample_rate) as usize;
        if capacity < 1 {
            return Err(BufferError::InvalidWindow(
                config.window_secs,
                config.sample_rate,
            ));
        }

        let sink = match &config.recording {
            RecordingMode::Disabled => None,
            RecordingMode::AutoNamed { data_dir, label } => Some(match label {
                Some(label) => RecordingSink::create_labeled(data_dir, *label)?,
                None => RecordingSink::create_auto(data_dir)?,
            }),
            RecordingMode::File { path } => Some(RecordingSink::create(path)?),
        };

        Ok(Self {
            channel_names: config.channel_names,
            sample_rate: config.sample_rate,
            capacity,
            inner: Mutex::new(Inner {
                window: None,
                fill_counter: capacity as i64,
                sink,
            }),
            update_cond: Condvar::new(),
            version: AtomicU64::new(0),
        })
    }

    /// Ordered channel names fixed at construction.
    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// Nominal sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Number of samples the window holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Path of the recording file, if recording is enabled.
    pub fn recording_path(&self) -> Option<PathBuf> {
        self.inner.lock().sink.as_ref().map(|s| s.path().to_path_buf())
    }

    /// Number of full windows flushed to the recording file so far.
    pub fn windows_written(&self) -> u64 {
        self.inner
            .lock()
            .sink
            .as_ref()
            .map(|s| s.windows_written())
            .unwrap_or(0)
    }

    /// Allocate the zero-filled window and restart the fill counter.
    ///
    /// Callable at any time as a hard reset; previously stored samples are
    /// discarded without being flushed.
    pub fn initialize(&self) {
        let mut inner = self.inner.lock();
        inner.window = Some(SampleRing::zeroed(self.capacity, self.channel_names.len()));
        inner.fill_counter = self.capacity as i64;
    }

    /// Point-in-time copy of the window, oldest to newest.
    pub fn snapshot(&self) -> Result<Vec<Sample>, BufferError> {
        let inner = self.inner.lock();
        inner
            .window
            .as_ref()
            .map(|w| w.to_vec())
            .ok_or(BufferError::NotInitialized)
    }

    /// Timestamp of the newest stored sample.
    ///
    /// Reads 0.0 off a placeholder until real data arrives, which anchors
    /// dejittered session clocks at zero.
    pub fn last_timestamp(&self) -> Result<f64, BufferError> {
        let inner = self.inner.lock();
        inner
            .window
            .as_ref()
            .map(|w| w.newest().timestamp)
            .ok_or(BufferError::NotInitialized)
    }

    /// Append a chunk of samples, flushing the window when it fills.
    ///
    /// `timestamps` and `samples` must be equal length and every row must
    /// match the buffer's channel arity; the chunk is rejected before any
    /// mutation otherwise. The append runs in two phases around the flush
    /// point so the flushed window always carries exactly the samples that
    /// filled it. A sink failure surfaces here with the pre-flush appends
    /// retained and the counter unreset, so the flush is retried on the next
    /// append.
    ///
    /// Every call bumps the update version and wakes waiting readers, even
    /// for an empty chunk.
    pub fn append_chunk(
        &self,
        timestamps: &[f64],
        samples: &[Vec<f64>],
    ) -> Result<(), BufferError> {
        if timestamps.len() != samples.len() {
            return Err(BufferError::ChunkLengthMismatch(
                timestamps.len(),
                samples.len(),
            ));
        }
        for row in samples {
            if row.len() != self.channel_names.len() {
                return Err(BufferError::ChannelCountMismatch(
                    self.channel_names.len(),
                    row.len(),
                ));
            }
        }

        let mut guard = self.inner.lock();
        let Inner {
            window,
            fill_counter,
            sink,
        } = &mut *guard;
        let window = window.as_mut().ok_or(BufferError::NotInitialized)?;

        let k = timestamps.len() as i64;
        *fill_counter -= k;
        let cutoff = (k + *fill_counter).clamp(0, k) as usize;

        for (ts, row) in timestamps[..cutoff].iter().zip(&samples[..cutoff]) {
            window.push(Sample::new(*ts, row.clone()));
        }

        if *fill_counter < 1 {
            if let Some(sink) = sink.as_mut() {
                let rows = window.to_vec();
                sink.write_window(&rows)?;
                log::debug!(
                    "flushed window of {} samples to {}",
                    rows.len(),
                    sink.path().display()
                );
            }
            *fill_counter = self.capacity as i64;
        }

        for (ts, row) in timestamps[cutoff..].iter().zip(&samples[cutoff..]) {
            window.push(Sample::new(*ts, row.clone()));
        }

        self.version.fetch_add(1, Ordering::SeqCst);
        self.update_cond.notify_all();
        Ok(())
    }

    /// Current update version; use as the starting cursor for
    /// [`wait_for_update`](Self::wait_for_update).
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Block until the version moves past `last_seen` or `timeout` elapses.
    ///
    /// Returns the new version to use as the next cursor, or `None` on
    /// timeout. Each reader keeps its own cursor, so one reader consuming a
    /// wakeup never hides an update from another.
    pub fn wait_for_update(&self, last_seen: u64, timeout: Duration) -> Option<u64> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            let current = self.version.load(Ordering::SeqCst);
            if current != last_seen {
                return Some(current);
            }
            if self.update_cond.wait_until(&mut inner, deadline).timed_out() {
                // one last check in case a notify raced the timeout
                let current = self.version.load(Ordering::SeqCst);
                return (current != last_seen).then_some(current);
            }
        }
    }
}
