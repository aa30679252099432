//! Append-only persistence for filled windows.
//!
//! Recordings are plain text, one row per sample: the timestamp followed by
//! one value per channel, whitespace-separated. The file is opened in append
//! mode once and kept open for the sink's lifetime, so restarting a session
//! against an explicit filename resumes the same recording. Auto-named files
//! follow `timeseries_<date>_<label>.csv` with the smallest unused integer
//! label for the day.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;

use crate::core::ring::Sample;

/// Errors raised while opening or writing a recording file.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to create data directory {0}: {1}")]
    CreateDir(String, #[source] std::io::Error),

    #[error("failed to open recording file {0}: {1}")]
    Open(String, #[source] std::io::Error),

    #[error("failed to write recording file {0}: {1}")]
    Write(String, #[source] std::io::Error),
}

/// Append-only writer for whitespace-delimited sample rows.
///
/// `write_window` appends one full window of rows and flushes, so every
/// window handed to the sink is durable even if the process dies mid-session.
#[derive(Debug)]
pub struct RecordingSink {
    path: PathBuf,
    writer: BufWriter<File>,
    windows_written: u64,
}

impl RecordingSink {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RecordError::CreateDir(parent.display().to_string(), e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RecordError::Open(path.display().to_string(), e))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            windows_written: 0,
        })
    }

    /// Open the next unused auto-named file under `data_dir` for today's date.
    pub fn create_auto(data_dir: impl AsRef<Path>) -> Result<Self, RecordError> {
        let date = Local::now().date_naive().to_string();
        let path = next_available_path(data_dir.as_ref(), &date, |p| p.exists());
        Self::create(path)
    }

    /// Open today's auto-named file with an explicit label, appending if it
    /// already exists.
    pub fn create_labeled(data_dir: impl AsRef<Path>, label: u64) -> Result<Self, RecordError> {
        let date = Local::now().date_naive().to_string();
        let path = data_dir
            .as_ref()
            .join(format!("timeseries_{}_{}.csv", date, label));
        Self::create(path)
    }

    /// Path of the file being appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of windows flushed so far.
    pub fn windows_written(&self) -> u64 {
        self.windows_written
    }

    /// Append one window of rows and flush to disk.
    pub fn write_window(&mut self, samples: &[Sample]) -> Result<(), RecordError> {
        for sample in samples {
            write!(self.writer, "{}", sample.timestamp).map_err(|e| self.write_err(e))?;
            for value in &sample.channels {
                write!(self.writer, " {}", value).map_err(|e| self.write_err(e))?;
            }
            writeln!(self.writer).map_err(|e| self.write_err(e))?;
        }
        self.writer.flush().map_err(|e| self.write_err(e))?;
        self.windows_written += 1;
        Ok(())
    }

    fn write_err(&self, e: std::io::Error) -> RecordError {
        RecordError::Write(self.path.display().to_string(), e)
    }
}

/// First `timeseries_<date>_<label>.csv` path under `dir` that `exists`
/// rejects, trying integer labels from 0 upward.
pub fn next_available_path<F>(dir: &Path, date: &str, exists: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let mut label: u64 = 0;
    loop {
        let candidate = dir.join(format!("timeseries_{}_{}.csv", date, label));
        if !exists(&candidate) {
            return candidate;
        }
        label += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse_rows(path: &Path) -> Vec<Vec<f64>> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| {
                line.split_whitespace()
                    .map(|v| v.parse().unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_next_available_path_skips_taken_labels() {
        let dir = Path::new("data");
        let taken = [
            dir.join("timeseries_2026-08-26_0.csv"),
            dir.join("timeseries_2026-08-26_1.csv"),
        ];
        let path = next_available_path(dir, "2026-08-26", |p| taken.contains(&p.to_path_buf()));
        assert_eq!(path, dir.join("timeseries_2026-08-26_2.csv"));
    }

    #[test]
    fn test_next_available_path_starts_at_zero() {
        let path = next_available_path(Path::new("data"), "2026-08-26", |_| false);
        assert_eq!(path, Path::new("data").join("timeseries_2026-08-26_0.csv"));
    }

    #[test]
    fn test_write_window_appends_and_flushes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.csv");
        let mut sink = RecordingSink::create(&path).unwrap();

        let window = vec![
            Sample::new(0.5, vec![1.0, -2.0]),
            Sample::new(1.0, vec![3.5, 4.25]),
        ];
        sink.write_window(&window).unwrap();
        sink.write_window(&window).unwrap();
        assert_eq!(sink.windows_written(), 2);

        // flushed without dropping the sink
        let rows = parse_rows(&path);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![0.5, 1.0, -2.0]);
        assert_eq!(rows[3], vec![1.0, 3.5, 4.25]);
    }

    #[test]
    fn test_reopening_appends_to_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.csv");

        let window = vec![Sample::new(1.0, vec![2.0])];
        RecordingSink::create(&path)
            .unwrap()
            .write_window(&window)
            .unwrap();
        RecordingSink::create(&path)
            .unwrap()
            .write_window(&window)
            .unwrap();

        assert_eq!(parse_rows(&path).len(), 2);
    }

    #[test]
    fn test_create_makes_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("rec.csv");
        let sink = RecordingSink::create(&path).unwrap();
        assert_eq!(sink.path(), path);
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_create_auto_picks_smallest_free_label() {
        let dir = tempdir().unwrap();
        let first = RecordingSink::create_auto(dir.path()).unwrap();
        let second = RecordingSink::create_auto(dir.path()).unwrap();

        let date = Local::now().date_naive().to_string();
        assert_eq!(
            first.path(),
            dir.path().join(format!("timeseries_{}_0.csv", date))
        );
        assert_eq!(
            second.path(),
            dir.path().join(format!("timeseries_{}_1.csv", date))
        );
    }
}
