//! Lab Streaming Layer network streams.
//!
//! Resolves a stream on the local network by name/type/source-id predicate
//! and pulls chunks through an inlet. Channel names come from the stream's
//! XML description when the device publishes them.

use std::time::{Duration, Instant};

use lsl::StreamInlet;

use super::{SampleChunk, SourceError, StreamConnection, StreamInfo};

// Chunk granularity hint passed to the inlet.
const INLET_CHUNK_HINT: usize = 32;

/// Blocking connection to a resolved LSL stream.
pub struct LslConnection {
    info: StreamInfo,
    inlet: StreamInlet,
}

impl LslConnection {
    /// Resolve a stream matching the given predicates and open an inlet.
    ///
    /// `None` predicates match any stream; when several streams match, the
    /// first is used.
    pub fn resolve(
        stream_type: Option<&str>,
        name: Option<&str>,
        source_id: Option<&str>,
        resolve_timeout: f64,
    ) -> Result<Self, SourceError> {
        log::info!(
            "resolving LSL stream: type={:?}, name={:?}, source_id={:?}",
            stream_type,
            name,
            source_id
        );

        let mut predicates = Vec::new();
        if let Some(name) = name {
            predicates.push(format!("name='{}'", name));
        }
        if let Some(stream_type) = stream_type {
            predicates.push(format!("type='{}'", stream_type));
        }
        if let Some(source_id) = source_id {
            predicates.push(format!("source_id='{}'", source_id));
        }
        let predicate = predicates.join(" and ");

        let streams = if predicate.is_empty() {
            lsl::resolve_streams(resolve_timeout)
        } else {
            lsl::resolve_bypred(&predicate, 1, resolve_timeout)
        };

        if streams.is_empty() {
            return Err(SourceError::Resolve(format!(
                "no LSL stream found within {} s",
                resolve_timeout
            )));
        }
        if streams.len() > 1 {
            log::warn!("{} LSL streams matched, using the first", streams.len());
        }
        let native = streams[0].clone();

        let channel_names = channel_names_from_xml(&native);
        let info = StreamInfo {
            name: native.name().to_string(),
            stream_type: native.stream_type().to_string(),
            source_id: native.source_id().to_string(),
            hostname: native.hostname().to_string(),
            sample_rate: native.sampling_rate(),
            channel_names,
        };

        // 360 seconds of inlet buffering, recovery enabled
        let inlet = StreamInlet::new(&native, 360, INLET_CHUNK_HINT, true)
            .map_err(|e| SourceError::Resolve(format!("failed to create inlet: {:?}", e)))?;

        log::info!(
            "resolved LSL stream '{}' ({} channels at {} Hz from {})",
            info.name,
            info.channel_count(),
            info.sample_rate,
            info.hostname
        );

        Ok(Self { info, inlet })
    }
}

impl StreamConnection for LslConnection {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn pull_chunk(
        &mut self,
        timeout: Duration,
        max_samples: usize,
    ) -> Result<SampleChunk, SourceError> {
        if max_samples == 0 {
            return Ok(SampleChunk::default());
        }

        let channel_count = self.info.channel_count();
        let mut flat = vec![0.0f32; max_samples * channel_count];
        let mut stamps = vec![0.0f64; max_samples];
        let deadline = Instant::now() + timeout;

        // the inlet pull never blocks, so poll it until data arrives or the
        // timeout elapses
        loop {
            let pulled = self
                .inlet
                .pull_chunk_f32(&mut flat, Some(&mut stamps))
                .map_err(|e| {
                    SourceError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("LSL pull error: {:?}", e),
                    ))
                })?;

            if pulled > 0 {
                let mut chunk = SampleChunk::default();
                for i in 0..pulled {
                    chunk.timestamps.push(stamps[i]);
                    chunk.samples.push(
                        (0..channel_count)
                            .map(|c| flat[i * channel_count + c] as f64)
                            .collect(),
                    );
                }
                return Ok(chunk);
            }
            if Instant::now() >= deadline {
                return Ok(SampleChunk::default());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Channel names from the stream's XML description, or `ch1..chN` when the
/// device does not publish labels.
fn channel_names_from_xml(native: &lsl::StreamInfo) -> Vec<String> {
    let channel_count = native.channel_count() as usize;

    if let Ok(xml) = native.as_xml() {
        let names = parse_labels(&xml);
        if names.len() == channel_count {
            return names;
        }
    }

    (1..=channel_count).map(|i| format!("ch{}", i)).collect()
}

fn parse_labels(xml: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in xml.lines() {
        if let (Some(start), Some(end)) = (line.find("<label>"), line.find("</label>")) {
            names.push(line[start + 7..end].trim().to_string());
        }
    }
    names
}
