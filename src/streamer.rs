//! Background streaming worker.
//!
//! A [`StreamWorker`] owns a stream connection and pulls chunks from it on a
//! dedicated thread, appending them to a shared [`TimeSeriesBuffer`]. Pulls
//! use a bounded timeout so the stop flag is observed within one timeout even
//! when the stream goes quiet. A disconnect or append failure ends the worker
//! and is reported through `join`; the buffer itself stays usable.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::core::buffer::{BufferError, TimeSeriesBuffer};
use crate::core::dejitter::dejitter_timestamps;
use crate::source::{SampleChunk, SourceError, StreamConnection};

/// Default wait per pull before the stop flag is rechecked.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(1);
/// Default upper bound on samples fetched per pull.
pub const DEFAULT_MAX_CHUNK: usize = 12;

/// Errors that end or prevent streaming.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Workers are single-shot; a stopped worker cannot be started again.
    #[error("worker has already been started")]
    AlreadyStarted,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Tuning for the pull loop.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Longest wait per pull before the stop flag is rechecked.
    pub pull_timeout: Duration,
    /// Upper bound on samples fetched per pull.
    pub max_chunk: usize,
    /// Replace source timestamps with a regular grid at the nominal rate.
    pub dejitter: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            max_chunk: DEFAULT_MAX_CHUNK,
            dejitter: true,
        }
    }
}

/// Lifecycle phase of a [`StreamWorker`]; phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Created,
    Running,
    Stopping,
    Stopped,
}

const PHASE_CREATED: u8 = 0;
const PHASE_RUNNING: u8 = 1;
const PHASE_STOPPING: u8 = 2;
const PHASE_STOPPED: u8 = 3;

fn phase_from_u8(value: u8) -> WorkerPhase {
    match value {
        PHASE_CREATED => WorkerPhase::Created,
        PHASE_RUNNING => WorkerPhase::Running,
        PHASE_STOPPING => WorkerPhase::Stopping,
        _ => WorkerPhase::Stopped,
    }
}

/// Handle to the background streaming thread.
pub struct StreamWorker {
    connection: Option<Box<dyn StreamConnection>>,
    buffer: Arc<TimeSeriesBuffer>,
    options: StreamOptions,
    keep_running: Arc<AtomicBool>,
    phase: Arc<AtomicU8>,
    last_error: Arc<Mutex<Option<WorkerError>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl StreamWorker {
    /// Create a worker over `connection` feeding `buffer`.
    pub fn new(
        connection: Box<dyn StreamConnection>,
        buffer: Arc<TimeSeriesBuffer>,
        options: StreamOptions,
    ) -> Self {
        Self {
            connection: Some(connection),
            buffer,
            options,
            keep_running: Arc::new(AtomicBool::new(false)),
            phase: Arc::new(AtomicU8::new(PHASE_CREATED)),
            last_error: Arc::new(Mutex::new(None)),
            thread_handle: None,
        }
    }

    /// Start streaming on a background thread.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.phase.load(Ordering::SeqCst) != PHASE_CREATED {
            return Err(WorkerError::AlreadyStarted);
        }
        let connection = self.connection.take().ok_or(WorkerError::AlreadyStarted)?;

        self.keep_running.store(true, Ordering::SeqCst);
        self.phase.store(PHASE_RUNNING, Ordering::SeqCst);

        let buffer = Arc::clone(&self.buffer);
        let options = self.options.clone();
        let keep_running = Arc::clone(&self.keep_running);
        let phase = Arc::clone(&self.phase);
        let last_error = Arc::clone(&self.last_error);

        let handle = thread::spawn(move || {
            if let Err(e) = run_stream_loop(connection, buffer, options, keep_running.clone()) {
                log::error!("stream worker stopped: {}", e);
                *last_error.lock() = Some(e);
            }
            keep_running.store(false, Ordering::SeqCst);
            phase.store(PHASE_STOPPED, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> WorkerPhase {
        phase_from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Whether the streaming thread is still pulling.
    pub fn is_running(&self) -> bool {
        self.phase() == WorkerPhase::Running
    }

    /// The buffer this worker appends to.
    pub fn buffer(&self) -> &Arc<TimeSeriesBuffer> {
        &self.buffer
    }

    /// Ask the worker to stop and wait for it.
    ///
    /// The thread exits within about one pull timeout of the flag clearing.
    pub fn stop(&mut self) {
        if self.phase.load(Ordering::SeqCst) == PHASE_RUNNING {
            self.phase.store(PHASE_STOPPING, Ordering::SeqCst);
        }
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.phase.store(PHASE_STOPPED, Ordering::SeqCst);
    }

    /// Wait for the worker to finish on its own and report what ended it.
    ///
    /// Does not ask the worker to stop; use [`stop`](Self::stop) for that.
    /// The terminal error is returned the first time it is reported.
    pub fn join(&mut self) -> Result<(), WorkerError> {
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.phase.store(PHASE_STOPPED, Ordering::SeqCst);
        match self.last_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pull/append loop run on the worker thread.
fn run_stream_loop(
    mut connection: Box<dyn StreamConnection>,
    buffer: Arc<TimeSeriesBuffer>,
    options: StreamOptions,
    keep_running: Arc<AtomicBool>,
) -> Result<(), WorkerError> {
    let sample_rate = connection.info().sample_rate;
    log::info!(
        "streaming '{}': {} channels at {} Hz",
        connection.info().name,
        connection.info().channel_count(),
        sample_rate
    );

    while keep_running.load(Ordering::SeqCst) {
        let chunk = connection.pull_chunk(options.pull_timeout, options.max_chunk)?;
        if chunk.is_empty() {
            continue;
        }

        let SampleChunk {
            timestamps,
            samples,
        } = chunk;
        let timestamps = if options.dejitter {
            dejitter_timestamps(&timestamps, sample_rate, buffer.last_timestamp()?)
        } else {
            timestamps
        };
        buffer.append_chunk(&timestamps, &samples)?;
    }
    Ok(())
}
