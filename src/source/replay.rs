//! Re-stream a recorded session file.
//!
//! Rows are read lazily in the recording format written by the sink: one
//! sample per line, timestamp first, then one value per channel. Recorded
//! timestamps pass through unchanged while delivery is paced in real time at
//! the configured rate, so a replayed session looks to the consumer like the
//! live one did. The end of the file behaves as a device disconnect.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::{SampleChunk, SourceError, StreamConnection, StreamInfo};

/// Playback rate assumed when none is configured.
const DEFAULT_REPLAY_RATE: f64 = 256.0;

/// Real-time-paced reader over a recorded file.
pub struct ReplayConnection {
    info: StreamInfo,
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    /// First row, parsed during open to learn the channel arity.
    pending: Option<(f64, Vec<f64>)>,
    line_no: usize,
    started: Instant,
    emitted: u64,
    exhausted: bool,
}

impl ReplayConnection {
    /// Open a recording and read its first row to learn the channel count.
    pub fn open(path: impl Into<PathBuf>, sample_rate: Option<f64>) -> Result<Self, SourceError> {
        let sample_rate = sample_rate.unwrap_or(DEFAULT_REPLAY_RATE);
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(SourceError::Parse(format!(
                "replay needs a positive sample rate, got {}",
                sample_rate
            )));
        }

        let path = path.into();
        let file = File::open(&path).map_err(|e| {
            SourceError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mut lines = BufReader::new(file).lines();

        let mut line_no = 0;
        let first = loop {
            match lines.next() {
                None => {
                    return Err(SourceError::Parse(format!(
                        "recording {} holds no samples",
                        path.display()
                    )))
                }
                Some(line) => {
                    line_no += 1;
                    let line = line.map_err(SourceError::Io)?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    break parse_row(&line, line_no, None)?;
                }
            }
        };

        let channel_names = (1..=first.1.len()).map(|i| format!("ch{}", i)).collect();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "replay".to_string());
        let info = StreamInfo::local(name, "replay", sample_rate, channel_names);

        Ok(Self {
            info,
            path,
            lines,
            pending: Some(first),
            line_no,
            started: Instant::now(),
            emitted: 0,
            exhausted: false,
        })
    }

    fn next_row(&mut self) -> Result<Option<(f64, Vec<f64>)>, SourceError> {
        if let Some(row) = self.pending.take() {
            return Ok(Some(row));
        }
        let expected = self.info.channel_count();
        loop {
            match self.lines.next() {
                None => return Ok(None),
                Some(line) => {
                    self.line_no += 1;
                    let line = line.map_err(SourceError::Io)?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    return parse_row(&line, self.line_no, Some(expected)).map(Some);
                }
            }
        }
    }
}

impl StreamConnection for ReplayConnection {
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
        if self.exhausted {
            return Err(SourceError::Disconnected(format!(
                "end of recording {}",
                self.path.display()
            )));
        }

        let rate = self.info.sample_rate;
        let mut available = (self.started.elapsed().as_secs_f64() * rate) as u64 + 1;
        if available <= self.emitted {
            let due_in = self.emitted as f64 / rate - self.started.elapsed().as_secs_f64();
            let wait = Duration::from_secs_f64(due_in.max(0.0)).min(timeout);
            std::thread::sleep(wait);
            available = (self.started.elapsed().as_secs_f64() * rate) as u64 + 1;
            if available <= self.emitted {
                return Ok(chunk);
            }
        }

        let n = (available - self.emitted).min(max_samples as u64);
        for _ in 0..n {
            match self.next_row()? {
                Some((ts, row)) => {
                    chunk.timestamps.push(ts);
                    chunk.samples.push(row);
                    self.emitted += 1;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        if chunk.is_empty() && self.exhausted {
            return Err(SourceError::Disconnected(format!(
                "end of recording {}",
                self.path.display()
            )));
        }
        Ok(chunk)
    }
}

fn parse_row(
    line: &str,
    line_no: usize,
    expected_channels: Option<usize>,
) -> Result<(f64, Vec<f64>), SourceError> {
    let mut values = line.split_whitespace().map(|field| {
        field
            .parse::<f64>()
            .map_err(|_| SourceError::Parse(format!("line {}: bad value '{}'", line_no, field)))
    });

    let timestamp = values
        .next()
        .ok_or_else(|| SourceError::Parse(format!("line {}: empty row", line_no)))??;
    let channels = values.collect::<Result<Vec<f64>, _>>()?;

    if channels.is_empty() {
        return Err(SourceError::Parse(format!(
            "line {}: row has no channel values",
            line_no
        )));
    }
    if let Some(expected) = expected_channels {
        if channels.len() != expected {
            return Err(SourceError::Parse(format!(
                "line {}: expected {} channel values, got {}",
                line_no,
                expected,
                channels.len()
            )));
        }
    }
    Ok((timestamp, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_recording(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    fn drain(conn: &mut ReplayConnection) -> Vec<(f64, Vec<f64>)> {
        let mut rows = Vec::new();
        loop {
            match conn.pull_chunk(Duration::from_millis(100), 64) {
                Ok(chunk) => {
                    for (ts, row) in chunk.timestamps.into_iter().zip(chunk.samples) {
                        rows.push((ts, row));
                    }
                }
                Err(SourceError::Disconnected(_)) => return rows,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn test_open_reads_stream_shape() {
        let (_dir, path) = write_recording("0.5 1 2 3\n1.0 4 5 6\n");
        let conn = ReplayConnection::open(&path, Some(128.0)).unwrap();
        assert_eq!(conn.info().channel_names, vec!["ch1", "ch2", "ch3"]);
        assert_eq!(conn.info().sample_rate, 128.0);
        assert_eq!(conn.info().name, "session");
    }

    #[test]
    fn test_rejects_degenerate_rates() {
        let (_dir, path) = write_recording("0.0 1\n");
        for rate in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ReplayConnection::open(&path, Some(rate)),
                Err(SourceError::Parse(_))
            ));
        }
    }

    #[test]
    fn test_replay_preserves_rows_in_order() {
        let (_dir, path) = write_recording("0.5 1 2\n1.0 3 4\n1.5 5 6\n");
        let mut conn = ReplayConnection::open(&path, Some(2000.0)).unwrap();

        let rows = drain(&mut conn);
        assert_eq!(
            rows,
            vec![
                (0.5, vec![1.0, 2.0]),
                (1.0, vec![3.0, 4.0]),
                (1.5, vec![5.0, 6.0]),
            ]
        );
    }

    #[test]
    fn test_end_of_recording_stays_disconnected() {
        let (_dir, path) = write_recording("0.0 1\n");
        let mut conn = ReplayConnection::open(&path, Some(2000.0)).unwrap();
        drain(&mut conn);

        for _ in 0..2 {
            assert!(matches!(
                conn.pull_chunk(Duration::from_millis(10), 8),
                Err(SourceError::Disconnected(_))
            ));
        }
    }

    #[test]
    fn test_empty_recording_rejected_at_open() {
        let (_dir, path) = write_recording("");
        assert!(matches!(
            ReplayConnection::open(&path, None),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            ReplayConnection::open("/nonexistent/session.csv", None),
            Err(SourceError::Io(_))
        ));
    }

    #[test]
    fn test_malformed_rows_are_parse_errors() {
        // bad value mid-file
        let (_dir, path) = write_recording("0.0 1 2\n0.1 huh 4\n");
        let mut conn = ReplayConnection::open(&path, Some(2000.0)).unwrap();
        let result = std::iter::from_fn(|| {
            Some(conn.pull_chunk(Duration::from_millis(100), 64))
        })
        .find(|r| r.is_err())
        .unwrap();
        assert!(matches!(result, Err(SourceError::Parse(_))));

        // arity change mid-file
        let (_dir, path) = write_recording("0.0 1 2\n0.1 3\n");
        let mut conn = ReplayConnection::open(&path, Some(2000.0)).unwrap();
        let result = std::iter::from_fn(|| {
            Some(conn.pull_chunk(Duration::from_millis(100), 64))
        })
        .find(|r| r.is_err())
        .unwrap();
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }
}
