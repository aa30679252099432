//! Demonstration of the rolling-window streaming pipeline.
//!
//! This example shows how to:
//! 1. Resolve a stream connection (synthetic sine generator)
//! 2. Start the background stream worker
//! 3. Follow appends with the buffer's update signal
//! 4. Take snapshots of the rolling window
//!
//! Run with: cargo run --example live_window

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use biostream_agent::{
    core::{BufferConfig, RecordingMode, TimeSeriesBuffer},
    source::{resolve_connection, SourceConfig},
    streamer::{StreamOptions, StreamWorker},
};

fn main() {
    println!("Biostream Agent - Live Window Demo");
    println!("==================================");
    println!();

    // Four sine channels at 128 Hz
    let source = SourceConfig::Synthetic {
        channels: 4,
        sample_rate: 128.0,
    };
    let connection = match resolve_connection(&source) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error connecting: {e}");
            return;
        }
    };
    let info = connection.info().clone();

    println!(
        "Stream: {} ({} channels at {} Hz)",
        info.name,
        info.channel_count(),
        info.sample_rate
    );

    // Two second window, kept in memory only
    let buffer_config = BufferConfig {
        channel_names: info.channel_names.clone(),
        sample_rate: info.sample_rate,
        window_secs: 2.0,
        recording: RecordingMode::Disabled,
    };
    let buffer = match TimeSeriesBuffer::new(buffer_config) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            eprintln!("Error creating buffer: {e}");
            return;
        }
    };
    buffer.initialize();
    println!("Window: 2s ({} samples)", buffer.capacity());
    println!();
    println!("Streaming for 10 seconds...");
    println!();

    let mut worker = StreamWorker::new(connection, Arc::clone(&buffer), StreamOptions::default());
    if let Err(e) = worker.start() {
        eprintln!("Error starting worker: {e}");
        return;
    }

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let start = std::time::Instant::now();
    let mut cursor = buffer.version();
    let mut updates = 0u64;

    while running.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(10) {
        // Block until the worker appends fresh samples
        match buffer.wait_for_update(cursor, Duration::from_millis(500)) {
            Some(version) => {
                cursor = version;
                updates += 1;
            }
            None => continue,
        }

        // Report roughly once a second
        if updates % 10 == 0 {
            match buffer.snapshot() {
                Ok(window) => {
                    let newest = window.last().map(|s| s.timestamp).unwrap_or(0.0);
                    let mean: f64 =
                        window.iter().map(|s| s.channels[0]).sum::<f64>() / window.len() as f64;
                    println!(
                        "  [{:>4.1}s] {} updates | newest t={:.3} | ch0 mean={:+.4}",
                        start.elapsed().as_secs_f64(),
                        updates,
                        newest,
                        mean
                    );
                }
                Err(e) => eprintln!("  snapshot failed: {e}"),
            }
        }
    }

    // Stop streaming
    println!();
    println!("Stopping stream...");
    worker.stop();

    println!();
    println!("Saw {updates} buffer updates.");
    println!("Demo complete!");
}
