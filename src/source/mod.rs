//! Pluggable stream sources.
//!
//! A [`StreamConnection`] delivers timestamped multi-channel samples through
//! a bounded-wait pull interface. New source types are added by implementing
//! the trait, adding a [`SourceConfig`] variant, and registering it in
//! [`resolve_connection`].
//!
//! Current implementations:
//! - `channel`: in-process pair fed through a bounded channel
//! - `synthetic`: locally generated sinusoids, paced in real time
//! - `replay`: re-streams a recorded file at real-time pace
//! - `lsl`: Lab Streaming Layer network streams (feature `lsl-support`)

mod channel;
#[cfg(feature = "lsl-support")]
mod lsl;
mod replay;
mod synthetic;

pub use channel::{channel_pair, ChannelConnection, ChannelFeeder};
#[cfg(feature = "lsl-support")]
pub use lsl::LslConnection;
pub use replay::ReplayConnection;
pub use synthetic::SyntheticConnection;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving or reading a stream source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The remote end is gone and no more data will arrive.
    #[error("stream disconnected: {0}")]
    Disconnected(String),

    #[error("no matching stream: {0}")]
    Resolve(String),

    #[error("invalid stream data: {0}")]
    Parse(String),

    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The consuming side of an in-process pair has been dropped.
    #[error("connection closed by consumer")]
    Closed,
}

/// Identity and shape of a resolved stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    /// Content type, e.g. "EEG".
    pub stream_type: String,
    /// Unique identifier of the originating device or process.
    pub source_id: String,
    /// Host the stream originates from.
    pub hostname: String,
    /// Nominal rate in Hz; 0.0 for irregularly sampled streams.
    pub sample_rate: f64,
    /// Ordered channel names.
    pub channel_names: Vec<String>,
}

impl StreamInfo {
    /// Info for a stream originating in this process.
    pub fn local(
        name: impl Into<String>,
        stream_type: impl Into<String>,
        sample_rate: f64,
        channel_names: Vec<String>,
    ) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            name: name.into(),
            stream_type: stream_type.into(),
            source_id: format!("biostream-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            hostname,
            sample_rate,
            channel_names,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_names.len()
    }
}

/// A chunk of samples pulled from a connection.
///
/// Sample-major layout: `samples[i]` is one row of channel values taken at
/// `timestamps[i]`. Both vectors are always the same length.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleChunk {
    /// Source timestamps in seconds, one per sample.
    pub timestamps: Vec<f64>,
    /// Sample rows, one value per channel.
    pub samples: Vec<Vec<f64>>,
}

impl SampleChunk {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// A live connection delivering timestamped multi-channel samples.
///
/// `pull_chunk` blocks for at most `timeout` and returns up to `max_samples`
/// samples. An empty chunk means the wait elapsed with nothing to deliver,
/// which is not an error; `Disconnected` is terminal.
pub trait StreamConnection: Send {
    /// Identity and shape of the connected stream.
    fn info(&self) -> &StreamInfo;

    /// Pull the next chunk, waiting up to `timeout`.
    fn pull_chunk(
        &mut self,
        timeout: Duration,
        max_samples: usize,
    ) -> Result<SampleChunk, SourceError>;
}

/// Configuration for the resolvable source types.
///
/// Serde's tag attribute gives clean JSON for the config file; the in-process
/// channel source is constructed directly via [`channel_pair`] and has no
/// config form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// Locally generated test signal.
    #[serde(rename = "synthetic")]
    Synthetic {
        #[serde(default = "default_synthetic_channels")]
        channels: usize,
        #[serde(default = "default_synthetic_rate")]
        sample_rate: f64,
    },

    /// Re-stream a previously recorded file.
    #[serde(rename = "replay")]
    Replay {
        path: PathBuf,
        /// Playback rate in Hz; recordings carry no rate metadata.
        #[serde(default)]
        sample_rate: Option<f64>,
    },

    /// Lab Streaming Layer stream resolved on the local network.
    #[cfg(feature = "lsl-support")]
    #[serde(rename = "lsl")]
    Lsl {
        /// Stream type to resolve (e.g. "EEG"); None matches any.
        #[serde(default)]
        stream_type: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        source_id: Option<String>,
        /// Resolution timeout in seconds.
        #[serde(default = "default_resolve_timeout")]
        resolve_timeout: f64,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Synthetic {
            channels: default_synthetic_channels(),
            sample_rate: default_synthetic_rate(),
        }
    }
}

impl SourceConfig {
    /// Parse a compact command-line source spec.
    ///
    /// Accepted forms: `synthetic`, `synthetic:<channels>x<rate>`,
    /// `replay:<path>`, `replay:<path>@<rate>`, `lsl`, `lsl:<type>`.
    pub fn from_spec(spec: &str) -> Result<Self, SourceError> {
        let (kind, rest) = match spec.split_once(':') {
            Some((kind, rest)) => (kind, Some(rest)),
            None => (spec, None),
        };

        match kind {
            "synthetic" => {
                let (channels, sample_rate) = match rest {
                    None => (default_synthetic_channels(), default_synthetic_rate()),
                    Some(shape) => {
                        let (channels, rate) = shape.split_once('x').ok_or_else(|| {
                            SourceError::Parse(format!(
                                "expected <channels>x<rate>, got '{}'",
                                shape
                            ))
                        })?;
                        let channels = channels.parse().map_err(|_| {
                            SourceError::Parse(format!("invalid channel count '{}'", channels))
                        })?;
                        let rate = rate.parse().map_err(|_| {
                            SourceError::Parse(format!("invalid sample rate '{}'", rate))
                        })?;
                        (channels, rate)
                    }
                };
                Ok(SourceConfig::Synthetic {
                    channels,
                    sample_rate,
                })
            }

            "replay" => {
                let rest = rest.ok_or_else(|| {
                    SourceError::Parse(
                        "replay needs a file path, e.g. replay:session.csv".to_string(),
                    )
                })?;
                let (path, sample_rate) = match rest.rsplit_once('@') {
                    Some((path, rate)) => {
                        let rate = rate.parse().map_err(|_| {
                            SourceError::Parse(format!("invalid sample rate '{}'", rate))
                        })?;
                        (path, Some(rate))
                    }
                    None => (rest, None),
                };
                Ok(SourceConfig::Replay {
                    path: PathBuf::from(path),
                    sample_rate,
                })
            }

            "lsl" => {
                #[cfg(feature = "lsl-support")]
                {
                    Ok(SourceConfig::Lsl {
                        stream_type: rest.map(str::to_string),
                        name: None,
                        source_id: None,
                        resolve_timeout: default_resolve_timeout(),
                    })
                }
                #[cfg(not(feature = "lsl-support"))]
                {
                    let _ = rest;
                    Err(SourceError::Parse(
                        "this build has no LSL support; rebuild with --features lsl-support"
                            .to_string(),
                    ))
                }
            }

            other => Err(SourceError::Parse(format!(
                "unknown source type '{}'",
                other
            ))),
        }
    }
}

/// Resolve a connection from configuration.
///
/// This is where new source types are registered.
pub fn resolve_connection(config: &SourceConfig) -> Result<Box<dyn StreamConnection>, SourceError> {
    match config {
        SourceConfig::Synthetic {
            channels,
            sample_rate,
        } => Ok(Box::new(SyntheticConnection::new(*channels, *sample_rate)?)),

        SourceConfig::Replay { path, sample_rate } => {
            Ok(Box::new(ReplayConnection::open(path, *sample_rate)?))
        }

        #[cfg(feature = "lsl-support")]
        SourceConfig::Lsl {
            stream_type,
            name,
            source_id,
            resolve_timeout,
        } => Ok(Box::new(LslConnection::resolve(
            stream_type.as_deref(),
            name.as_deref(),
            source_id.as_deref(),
            *resolve_timeout,
        )?)),
    }
}

fn default_synthetic_channels() -> usize {
    4
}

fn default_synthetic_rate() -> f64 {
    256.0
}

#[cfg(feature = "lsl-support")]
fn default_resolve_timeout() -> f64 {
    5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_synthetic_defaults() {
        let config = SourceConfig::from_spec("synthetic").unwrap();
        assert_eq!(
            config,
            SourceConfig::Synthetic {
                channels: 4,
                sample_rate: 256.0
            }
        );
    }

    #[test]
    fn test_spec_synthetic_with_shape() {
        let config = SourceConfig::from_spec("synthetic:8x512").unwrap();
        assert_eq!(
            config,
            SourceConfig::Synthetic {
                channels: 8,
                sample_rate: 512.0
            }
        );
    }

    #[test]
    fn test_spec_replay_with_rate() {
        let config = SourceConfig::from_spec("replay:data/session.csv@128").unwrap();
        assert_eq!(
            config,
            SourceConfig::Replay {
                path: PathBuf::from("data/session.csv"),
                sample_rate: Some(128.0),
            }
        );
    }

    #[test]
    fn test_spec_rejects_malformed_input() {
        assert!(matches!(
            SourceConfig::from_spec("synthetic:8"),
            Err(SourceError::Parse(_))
        ));
        assert!(matches!(
            SourceConfig::from_spec("replay"),
            Err(SourceError::Parse(_))
        ));
        assert!(matches!(
            SourceConfig::from_spec("telepathy"),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn test_source_config_json_round_trip() {
        let config = SourceConfig::Replay {
            path: PathBuf::from("rec.csv"),
            sample_rate: Some(256.0),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"replay\""));
        let back: SourceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_local_info_is_unique_per_stream() {
        let a = StreamInfo::local("demo", "EEG", 256.0, vec!["ch1".to_string()]);
        let b = StreamInfo::local("demo", "EEG", 256.0, vec!["ch1".to_string()]);
        assert_ne!(a.source_id, b.source_id);
        assert!(!a.hostname.is_empty());
        assert_eq!(a.channel_count(), 1);
    }

    #[test]
    fn test_resolve_synthetic_connection() {
        let conn = resolve_connection(&SourceConfig::default()).unwrap();
        assert_eq!(conn.info().channel_count(), 4);
        assert_eq!(conn.info().sample_rate, 256.0);
    }
}
