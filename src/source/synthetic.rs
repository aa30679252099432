//! Locally generated test signal.
//!
//! Emits one sinusoid per channel on an ideal clock: sample `i` carries
//! timestamp `i / rate` and becomes available once that much wall time has
//! passed since the connection was created. Useful for demos and for
//! exercising the pipeline without any hardware.

use std::time::{Duration, Instant};

use super::{SampleChunk, SourceError, StreamConnection, StreamInfo};

/// Frequency of the generated sinusoid in Hz.
const SIGNAL_HZ: f64 = 10.0;

/// Real-time-paced sinusoid generator.
pub struct SyntheticConnection {
    info: StreamInfo,
    started: Instant,
    emitted: u64,
}

impl SyntheticConnection {
    pub fn new(channels: usize, sample_rate: f64) -> Result<Self, SourceError> {
        if channels == 0 {
            return Err(SourceError::Parse(
                "synthetic source needs at least one channel".to_string(),
            ));
        }
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(SourceError::Parse(format!(
                "synthetic source needs a positive sample rate, got {}",
                sample_rate
            )));
        }

        let names = (1..=channels).map(|i| format!("sin{}", i)).collect();
        Ok(Self {
            info: StreamInfo::local("synthetic", "EEG", sample_rate, names),
            started: Instant::now(),
            emitted: 0,
        })
    }

    /// Samples available on the ideal clock after `elapsed` seconds.
    fn available(&self, elapsed: f64) -> u64 {
        (elapsed * self.info.sample_rate) as u64 + 1
    }

    fn value(&self, channel: usize, t: f64) -> f64 {
        let phase = channel as f64 * std::f64::consts::FRAC_PI_4;
        (2.0 * std::f64::consts::PI * SIGNAL_HZ * t + phase).sin()
    }
}

impl StreamConnection for SyntheticConnection {
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

        let rate = self.info.sample_rate;
        let mut available = self.available(self.started.elapsed().as_secs_f64());
        if available <= self.emitted {
            // wait for the next sample to come due, but never past the timeout
            let due_in = self.emitted as f64 / rate - self.started.elapsed().as_secs_f64();
            let wait = Duration::from_secs_f64(due_in.max(0.0)).min(timeout);
            std::thread::sleep(wait);
            available = self.available(self.started.elapsed().as_secs_f64());
            if available <= self.emitted {
                return Ok(chunk);
            }
        }

        let n = (available - self.emitted).min(max_samples as u64);
        let channels = self.info.channel_count();
        for _ in 0..n {
            let t = self.emitted as f64 / rate;
            chunk.timestamps.push(t);
            chunk
                .samples
                .push((0..channels).map(|c| self.value(c, t)).collect());
            self.emitted += 1;
        }
        Ok(chunk)
    }
}
