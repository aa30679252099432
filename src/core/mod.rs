//! Core data structures for the rolling window.
//!
//! This module contains:
//! - The fixed-capacity sample ring backing the window
//! - The thread-safe rolling buffer with counter-driven persistence
//! - Timestamp regularization for jittery stream clocks

pub mod buffer;
pub mod dejitter;
pub mod ring;

// Re-export commonly used types
pub use buffer::{
    BufferConfig, BufferError, RecordingMode, TimeSeriesBuffer, DEFAULT_WINDOW_SECS,
};
pub use dejitter::dejitter_timestamps;
pub use ring::{Sample, SampleRing};
