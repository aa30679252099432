//! Fixed-capacity sample storage backing the rolling window.
//!
//! The ring holds exactly `capacity` samples at all times: it is pre-filled
//! with zero-valued placeholder samples and pushing overwrites the oldest
//! slot. Placeholder samples carry timestamp 0.0 and zero channel values and
//! are not distinguishable from genuine all-zero samples; consumers see them
//! until `capacity` real samples have arrived.

use serde::{Deserialize, Serialize};

/// One instant of multi-channel sensor data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Stream-clock timestamp in seconds.
    pub timestamp: f64,
    /// One value per channel, in declared channel order.
    pub channels: Vec<f64>,
}

impl Sample {
    pub fn new(timestamp: f64, channels: Vec<f64>) -> Self {
        Self { timestamp, channels }
    }

    /// Zero-valued placeholder used to pre-fill a window before real data arrives.
    pub fn zeroed(channel_count: usize) -> Self {
        Self {
            timestamp: 0.0,
            channels: vec![0.0; channel_count],
        }
    }
}

/// Index-addressed ring of exactly `capacity` samples.
///
/// `head` marks the oldest slot, which is also the next overwrite target, so
/// the ring never grows or shrinks after construction. Iteration order is
/// oldest to newest.
#[derive(Debug, Clone)]
pub struct SampleRing {
    slots: Vec<Sample>,
    head: usize,
}

impl SampleRing {
    /// Create a ring pre-filled with zero-valued samples.
    pub fn zeroed(capacity: usize, channel_count: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be at least 1");
        Self {
            slots: vec![Sample::zeroed(channel_count); capacity],
            head: 0,
        }
    }

    /// Overwrite the oldest slot with `sample`, making it the newest.
    pub fn push(&mut self, sample: Sample) {
        self.slots[self.head] = sample;
        self.head = (self.head + 1) % self.slots.len();
    }

    /// The most recently pushed sample (a placeholder until the first push).
    pub fn newest(&self) -> &Sample {
        let idx = (self.head + self.slots.len() - 1) % self.slots.len();
        &self.slots[idx]
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        let capacity = self.slots.len();
        (0..capacity).map(move |i| &self.slots[(self.head + i) % capacity])
    }

    /// Independent copy of the current contents, oldest to newest.
    pub fn to_vec(&self) -> Vec<Sample> {
        self.iter().cloned().collect()
    }
}
