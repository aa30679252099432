//! Biostream Agent - rolling-window acquisition for live biosignal streams.
//!
//! This library keeps the most recent seconds of a multi-channel sample
//! stream in a fixed-capacity in-memory window, regularizes jittery
//! stream timestamps against the nominal sample rate, and appends one
//! full window to a whitespace-delimited CSV file every time the window
//! turns over.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  Stream Connection   │  synthetic / replay / LSL
//! │  (pull_chunk)        │
//! └──────────┬───────────┘
//!            │ timestamped chunks
//!            ▼
//! ┌──────────────────────┐
//! │  Stream Worker       │  background thread
//! │  (dejitter + append) │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐       ┌──────────────────────┐
//! │  Rolling Buffer      │──────▶│  Recording Sink      │
//! │  (window + counter)  │ flush │  (append-only CSV)   │
//! └──────────┬───────────┘       └──────────────────────┘
//!            │ version + condvar
//!            ▼
//!      reader threads (snapshot / wait_for_update)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use biostream_agent::core::{BufferConfig, TimeSeriesBuffer};
//! use biostream_agent::source::{resolve_connection, SourceConfig};
//! use biostream_agent::streamer::{StreamOptions, StreamWorker};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect to the default 4-channel synthetic stream at 256 Hz.
//!     let connection = resolve_connection(&SourceConfig::default())?;
//!     let info = connection.info().clone();
//!
//!     // Ten second rolling window over the stream's channels.
//!     let buffer = Arc::new(TimeSeriesBuffer::new(BufferConfig::new(
//!         info.channel_names,
//!         info.sample_rate,
//!     ))?);
//!     buffer.initialize();
//!
//!     let mut worker =
//!         StreamWorker::new(connection, Arc::clone(&buffer), StreamOptions::default());
//!     worker.start()?;
//!
//!     // Block until the stream delivers fresh samples, then inspect them.
//!     let cursor = buffer.version();
//!     if buffer.wait_for_update(cursor, Duration::from_secs(2)).is_some() {
//!         let window = buffer.snapshot()?;
//!         if let Some(newest) = window.last() {
//!             println!("newest timestamp: {}", newest.timestamp);
//!         }
//!     }
//!
//!     worker.stop();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod record;
pub mod source;
pub mod streamer;

// Re-export key types at crate root for convenience
pub use config::Config;
pub use core::{BufferConfig, BufferError, RecordingMode, Sample, TimeSeriesBuffer};
pub use record::{RecordError, RecordingSink};
pub use source::{
    resolve_connection, SampleChunk, SourceConfig, SourceError, StreamConnection, StreamInfo,
};
pub use streamer::{StreamOptions, StreamWorker, WorkerError, WorkerPhase};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
