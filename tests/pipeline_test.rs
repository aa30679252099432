//! Integration tests for the streaming pipeline

use biostream_agent::core::{BufferConfig, RecordingMode, TimeSeriesBuffer};
use biostream_agent::source::{channel_pair, resolve_connection, SourceConfig, StreamInfo};
use biostream_agent::streamer::{StreamOptions, StreamWorker, WorkerPhase};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_until<F: Fn() -> bool>(timeout: Duration, ready: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if ready() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    ready()
}

#[test]
fn test_channel_stream_records_full_windows() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let out_path = dir.path().join("session.csv");

    let info = StreamInfo::local("test-stream", "EEG", 8.0, vec!["a".into(), "b".into()]);
    let (feeder, connection) = channel_pair(info);

    // Capacity 4 so the window turns over quickly
    let buffer = Arc::new(
        TimeSeriesBuffer::new(BufferConfig {
            channel_names: vec!["a".into(), "b".into()],
            sample_rate: 8.0,
            window_secs: 0.5,
            recording: RecordingMode::File {
                path: out_path.clone(),
            },
        })
        .expect("Failed to create buffer"),
    );
    buffer.initialize();

    // Queue all samples up front so the worker drains them in chunks of 3:
    // [0 1 2] [3 4 5] [6 7 8] [9]
    for i in 0..10 {
        feeder
            .push(i as f64, vec![i as f64, i as f64 * 10.0])
            .expect("Failed to push sample");
    }

    let options = StreamOptions {
        pull_timeout: Duration::from_millis(50),
        max_chunk: 3,
        dejitter: false,
    };
    let mut worker = StreamWorker::new(Box::new(connection), Arc::clone(&buffer), options);
    worker.start().expect("Failed to start worker");

    // The fill counter crosses zero inside chunk [3 4 5] and again at [9]
    assert!(wait_until(Duration::from_secs(5), || {
        buffer.windows_written() == 2
    }));

    worker.stop();
    assert_eq!(worker.phase(), WorkerPhase::Stopped);

    // First flush holds samples 0..=3, second holds 6..=9
    let contents = std::fs::read_to_string(&out_path).expect("Failed to read recording");
    let rows: Vec<&str> = contents.lines().collect();
    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0], "0 0 0");
    assert_eq!(rows[3], "3 3 30");
    assert_eq!(rows[4], "6 6 60");
    assert_eq!(rows[7], "9 9 90");

    // The in-memory window tracks the newest samples
    let window = buffer.snapshot().expect("Failed to snapshot");
    assert_eq!(window.len(), 4);
    assert_eq!(window[3].timestamp, 9.0);
    assert_eq!(window[3].channels, vec![9.0, 90.0]);
}

#[test]
fn test_replay_source_plays_file_to_completion() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("session.csv");

    let mut contents = String::new();
    for i in 0..12 {
        contents.push_str(&format!("{} {} {}\n", i, i, i * 2));
    }
    std::fs::write(&path, contents).expect("Failed to write replay file");

    // High replay rate keeps the test fast
    let config = SourceConfig::Replay {
        path: path.clone(),
        sample_rate: Some(400.0),
    };
    let connection = resolve_connection(&config).expect("Failed to open replay");
    assert_eq!(connection.info().channel_count(), 2);
    assert_eq!(connection.info().sample_rate, 400.0);

    let buffer = Arc::new(
        TimeSeriesBuffer::new(BufferConfig {
            channel_names: vec!["ch1".into(), "ch2".into()],
            sample_rate: 400.0,
            window_secs: 0.01,
            recording: RecordingMode::Disabled,
        })
        .expect("Failed to create buffer"),
    );
    buffer.initialize();

    let options = StreamOptions {
        pull_timeout: Duration::from_millis(20),
        max_chunk: 5,
        dejitter: false,
    };
    let mut worker = StreamWorker::new(connection, Arc::clone(&buffer), options);
    worker.start().expect("Failed to start worker");

    // Replay is finite: the worker stops on its own at end of file
    assert!(wait_until(Duration::from_secs(5), || !worker.is_running()));
    assert_eq!(worker.phase(), WorkerPhase::Stopped);
    assert!(worker.join().is_err());

    // The window holds the last four rows of the file
    let window = buffer.snapshot().expect("Failed to snapshot");
    let timestamps: Vec<f64> = window.iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![8.0, 9.0, 10.0, 11.0]);
    assert_eq!(window[3].channels, vec![11.0, 22.0]);
}

#[test]
fn test_reader_wakes_on_stream_updates() {
    let info = StreamInfo::local("wake-test", "EEG", 100.0, vec!["c1".into()]);
    let (feeder, connection) = channel_pair(info);

    let buffer = Arc::new(
        TimeSeriesBuffer::new(BufferConfig::new(vec!["c1".into()], 100.0))
            .expect("Failed to create buffer"),
    );
    buffer.initialize();

    let mut worker = StreamWorker::new(
        Box::new(connection),
        Arc::clone(&buffer),
        StreamOptions::default(),
    );
    worker.start().expect("Failed to start worker");

    // Reader blocks on the update signal instead of polling
    let reader_buffer = Arc::clone(&buffer);
    let reader = std::thread::spawn(move || {
        let mut cursor = reader_buffer.version();
        let mut wakes = 0;
        while wakes < 3 {
            match reader_buffer.wait_for_update(cursor, Duration::from_secs(5)) {
                Some(version) => {
                    cursor = version;
                    wakes += 1;
                }
                None => break,
            }
        }
        wakes
    });

    for i in 0..30 {
        feeder
            .push(i as f64 / 100.0, vec![i as f64])
            .expect("Failed to push sample");
        std::thread::sleep(Duration::from_millis(5));
    }

    let wakes = reader.join().expect("Reader thread panicked");
    assert_eq!(wakes, 3);

    worker.stop();
}

#[test]
fn test_auto_named_recording_creates_dated_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    let info = StreamInfo::local("auto", "EEG", 4.0, vec!["x".into()]);
    let (feeder, connection) = channel_pair(info);
    for i in 0..4 {
        feeder.push(i as f64, vec![0.5]).expect("Failed to push sample");
    }

    let buffer = Arc::new(
        TimeSeriesBuffer::new(BufferConfig {
            channel_names: vec!["x".into()],
            sample_rate: 4.0,
            window_secs: 1.0,
            recording: RecordingMode::AutoNamed {
                data_dir: dir.path().to_path_buf(),
                label: None,
            },
        })
        .expect("Failed to create buffer"),
    );
    buffer.initialize();

    // First unused label in an empty directory is 0
    let path = buffer.recording_path().expect("No recording path");
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .expect("No file name")
        .to_string();
    assert!(name.starts_with("timeseries_"));
    assert!(name.ends_with("_0.csv"));

    let options = StreamOptions {
        pull_timeout: Duration::from_millis(20),
        max_chunk: 4,
        dejitter: true,
    };
    let mut worker = StreamWorker::new(Box::new(connection), Arc::clone(&buffer), options);
    worker.start().expect("Failed to start worker");

    assert!(wait_until(Duration::from_secs(5), || {
        buffer.windows_written() == 1
    }));
    worker.stop();

    // One full window, timestamps rewritten onto the 4 Hz grid
    let contents = std::fs::read_to_string(&path).expect("Failed to read recording");
    let rows: Vec<&str> = contents.lines().collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], "0.25 0.5");
    assert_eq!(rows[3], "1 0.5");
}
