//! Timestamp regularization for jittery stream clocks.
//!
//! Network transports deliver samples in bursts, so raw arrival timestamps
//! cluster around transmission times rather than acquisition times. When the
//! nominal sample rate is known, the true spacing is `1 / rate` and a regular
//! grid anchored at the previous stored timestamp recovers it.

/// Replace `timestamps` with a regular grid continuing from `last_timestamp`.
///
/// The i-th returned value (1-based) is `last_timestamp + i / sample_rate`.
/// The input slice only contributes its length; the raw values are discarded.
/// A non-positive or non-finite `sample_rate` means no nominal rate is
/// declared, and the raw timestamps are returned unchanged.
pub fn dejitter_timestamps(
    timestamps: &[f64],
    sample_rate: f64,
    last_timestamp: f64,
) -> Vec<f64> {
    if !(sample_rate > 0.0) || !sample_rate.is_finite() {
        return timestamps.to_vec();
    }

    (1..=timestamps.len())
        .map(|i| last_timestamp + i as f64 / sample_rate)
        .collect()
}
