//! Biostream Agent CLI
//!
//! Rolling-window recorder for live biosignal streams.

use biostream_agent::{
    config::Config,
    core::{BufferConfig, RecordingMode, TimeSeriesBuffer},
    source::{resolve_connection, SourceConfig},
    streamer::StreamWorker,
    VERSION,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "biostream")]
#[command(version = VERSION)]
#[command(about = "Rolling-window recorder for live biosignal streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a stream into the rolling window
    Record {
        /// Stream source: synthetic, synthetic:CHxRATE, replay:PATH[@RATE] or lsl[:TYPE]
        #[arg(long)]
        source: Option<String>,

        /// Rolling window length in seconds
        #[arg(long)]
        window: Option<f64>,

        /// Append full windows to this exact file instead of an auto-named one
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Fixed integer label for the auto-named recording file
        #[arg(long)]
        label: Option<u64>,

        /// Keep the window in memory only, never write to disk
        #[arg(long)]
        no_record: bool,

        /// Use raw stream timestamps instead of rate-derived ones
        #[arg(long)]
        no_dejitter: bool,
    },

    /// Resolve a stream source and show its metadata
    Info {
        /// Stream source (defaults to the configured one)
        #[arg(long)]
        source: Option<String>,
    },

    /// Show configuration
    Config,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record {
            source,
            window,
            output,
            label,
            no_record,
            no_dejitter,
        } => {
            cmd_record(source, window, output, label, no_record, no_dejitter);
        }
        Commands::Info { source } => {
            cmd_info(source);
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn cmd_record(
    source: Option<String>,
    window: Option<f64>,
    output: Option<PathBuf>,
    label: Option<u64>,
    no_record: bool,
    no_dejitter: bool,
) {
    println!("Biostream Agent v{VERSION}");
    println!();

    // Load or create configuration
    let config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    // A source spec on the command line overrides the configured source
    let source_config = match source {
        Some(spec) => match SourceConfig::from_spec(&spec) {
            Ok(sc) => sc,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => config.source.clone(),
    };

    // Recording destination. An explicit output file wins over the auto-named
    // scheme, and --no-record wins over everything.
    let recording = if no_record {
        RecordingMode::Disabled
    } else if let Some(path) = output {
        RecordingMode::File { path }
    } else if let Some(label) = label {
        RecordingMode::AutoNamed {
            data_dir: config.data_dir.clone(),
            label: Some(label),
        }
    } else {
        config.recording_mode()
    };

    println!("Connecting to stream...");
    let connection = match resolve_connection(&source_config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error connecting to stream: {e}");
            std::process::exit(1);
        }
    };
    let info = connection.info().clone();

    let window_secs = window.unwrap_or(config.window_secs);
    let buffer_config = BufferConfig {
        channel_names: info.channel_names.clone(),
        sample_rate: info.sample_rate,
        window_secs,
        recording,
    };
    let buffer = match TimeSeriesBuffer::new(buffer_config) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    buffer.initialize();

    let mut options = config.stream_options();
    if no_dejitter {
        options.dejitter = false;
    }

    println!(
        "  Stream: {} ({}) from {}",
        info.name, info.stream_type, info.hostname
    );
    println!(
        "  Channels: {} [{}]",
        info.channel_count(),
        info.channel_names.join(", ")
    );
    println!("  Sample rate: {} Hz", info.sample_rate);
    println!("  Window: {}s ({} samples)", window_secs, buffer.capacity());
    match buffer.recording_path() {
        Some(path) => println!("  Recording to: {:?}", path),
        None => println!("  Recording: disabled"),
    }
    println!(
        "  Dejitter: {}",
        if options.dejitter {
            "enabled"
        } else {
            "disabled"
        }
    );

    let mut worker = StreamWorker::new(connection, Arc::clone(&buffer), options);
    if let Err(e) = worker.start() {
        eprintln!("Error starting stream worker: {e}");
        std::process::exit(1);
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(r);

    // Main loop: follow buffer updates and report each flushed window
    let mut cursor = buffer.version();
    let mut windows_seen = buffer.windows_written();

    while running.load(Ordering::SeqCst) && worker.is_running() {
        if let Some(version) = buffer.wait_for_update(cursor, Duration::from_millis(500)) {
            cursor = version;
        }

        let written = buffer.windows_written();
        if written != windows_seen {
            println!(
                "[{}] Window flushed ({} samples) | total: {}",
                Local::now().format("%H:%M:%S"),
                buffer.capacity(),
                written
            );
            windows_seen = written;
        }
    }

    // Stop streaming
    println!();
    println!("Stopping stream...");
    worker.stop();
    if let Err(e) = worker.join() {
        eprintln!("Stream ended: {e}");
    }

    // Final stats
    println!();
    match buffer.recording_path() {
        Some(path) => println!(
            "Recorded {} full window(s) to {:?}",
            buffer.windows_written(),
            path
        ),
        None => println!("Recording disabled; no data written."),
    }
}

fn cmd_info(source: Option<String>) {
    let config = Config::load().unwrap_or_default();

    let source_config = match source {
        Some(spec) => match SourceConfig::from_spec(&spec) {
            Ok(sc) => sc,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => config.source.clone(),
    };

    println!("Resolving stream...");
    let connection = match resolve_connection(&source_config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error resolving stream: {e}");
            std::process::exit(1);
        }
    };
    let info = connection.info();

    println!();
    println!("Stream Info");
    println!("===========");
    println!();
    println!("Name: {}", info.name);
    println!("Type: {}", info.stream_type);
    println!("Source ID: {}", info.source_id);
    println!("Hostname: {}", info.hostname);
    println!("Sample rate: {} Hz", info.sample_rate);
    println!("Channels ({}):", info.channel_count());
    for name in &info.channel_names {
        println!("  {name}");
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
