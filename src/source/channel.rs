//! In-process stream fed through a bounded channel.
//!
//! `channel_pair` splits a stream into a [`ChannelFeeder`] for the producing
//! side and a [`ChannelConnection`] for the consumer. Tests and embedders use
//! this to drive the pipeline with hand-built samples; dropping the feeder
//! ends the stream the way a device disconnect does.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use super::{SampleChunk, SourceError, StreamConnection, StreamInfo};

// Bounded to keep a stalled consumer from buffering the stream forever.
const CHANNEL_CAPACITY: usize = 10_000;

/// Producing half of an in-process stream.
#[derive(Debug, Clone)]
pub struct ChannelFeeder {
    sender: Sender<(f64, Vec<f64>)>,
}

impl ChannelFeeder {
    /// Queue one sample, blocking while the channel is full.
    ///
    /// Fails with `Closed` once the connection half has been dropped.
    pub fn push(&self, timestamp: f64, channels: Vec<f64>) -> Result<(), SourceError> {
        self.sender
            .send((timestamp, channels))
            .map_err(|_| SourceError::Closed)
    }

    /// Queue one sample without blocking, dropping it if the channel is full.
    ///
    /// Returns whether the sample was queued.
    pub fn try_push(&self, timestamp: f64, channels: Vec<f64>) -> Result<bool, SourceError> {
        match self.sender.try_send((timestamp, channels)) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(SourceError::Closed),
        }
    }

    /// Queue a whole chunk in order, blocking while the channel is full.
    pub fn push_chunk(&self, timestamps: &[f64], rows: &[Vec<f64>]) -> Result<(), SourceError> {
        for (ts, row) in timestamps.iter().zip(rows) {
            self.push(*ts, row.clone())?;
        }
        Ok(())
    }
}

/// Consuming half of an in-process stream.
pub struct ChannelConnection {
    info: StreamInfo,
    receiver: Receiver<(f64, Vec<f64>)>,
}

/// Create a connected feeder/connection pair described by `info`.
pub fn channel_pair(info: StreamInfo) -> (ChannelFeeder, ChannelConnection) {
    let (sender, receiver) = bounded(CHANNEL_CAPACITY);
    (
        ChannelFeeder { sender },
        ChannelConnection { info, receiver },
    )
}

impl StreamConnection for ChannelConnection {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn pull_chunk(
        &mut self,
        timeout: Duration,
        max_samples: usize,
    ) -> Result<SampleChunk, SourceError> {
        let mut chunk = SampleChunk::default();
        if max_samples == 0 {
            return Ok(chunk);
        }

        match self.receiver.recv_timeout(timeout) {
            Ok((ts, row)) => {
                chunk.timestamps.push(ts);
                chunk.samples.push(row);
            }
            Err(RecvTimeoutError::Timeout) => return Ok(chunk),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SourceError::Disconnected("feeder dropped".to_string()))
            }
        }

        // drain whatever is already queued, up to the chunk limit; a
        // disconnect mid-drain still delivers this chunk and surfaces on the
        // next pull
        while chunk.len() < max_samples {
            match self.receiver.try_recv() {
                Ok((ts, row)) => {
                    chunk.timestamps.push(ts);
                    chunk.samples.push(row);
                }
                Err(_) => break,
            }
        }

        Ok(chunk)
    }
}
