//! In-memory audio decoding using symphonia
//!
//! Assets arrive as bytes from the offline cache, so decoding runs over a
//! `Cursor` rather than a file handle.
//!
//! # Sample Format
//!
//! - Output: Stereo f32 samples (interleaved: [L, R, L, R, ...])
//! - Mono files: duplicated to stereo
//! - Multi-channel: downmixed to stereo
//! - Any source sample format is converted through `SampleBuffer<f32>`

use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Fully decoded asset at its native sample rate
#[derive(Debug)]
pub struct DecodedAudio {
    /// Interleaved stereo f32 samples [L, R, L, R, ...]
    pub samples: Vec<f32>,

    /// Native sample rate of the asset
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Extension of the path component of a URL, used as a probe hint
fn extension_hint(url: &str) -> Option<&str> {
    let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
}

/// Decode a complete asset held in memory
///
/// `name` is only used for the format hint and log messages.
pub fn decode_bytes(bytes: Vec<u8>, name: &str) -> Result<DecodedAudio> {
    if bytes.is_empty() {
        return Err(Error::Decode(format!("{}: empty asset", name)));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint(name) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("{}: unsupported format: {}", name, e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode(format!("{}: no audio track found", name)))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode(format!("{}: unknown sample rate", name)))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("{}: unsupported codec: {}", name, e)))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(Error::Decode(format!("{}: read failed: {}", name, e)));
            }
        };

        // Skip packets from other tracks
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frame: skip it and keep going
                warn!("{}: skipping undecodable packet: {}", name, e);
                continue;
            }
            Err(e) => {
                return Err(Error::Decode(format!("{}: decode failed: {}", name, e)));
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let too_small = sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < decoded.capacity() * channels);
        if too_small {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            append_as_stereo(&mut samples, buf.samples(), channels);
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode(format!("{}: no audio decoded", name)));
    }

    debug!(
        "Decoded {}: {} frames at {}Hz",
        name,
        samples.len() / 2,
        sample_rate
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Append interleaved samples of any channel count as interleaved stereo
fn append_as_stereo(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    match channels {
        0 => {}
        1 => {
            // Mono: duplicate to stereo
            out.reserve(interleaved.len() * 2);
            for &sample in interleaved {
                out.push(sample);
                out.push(sample);
            }
        }
        2 => out.extend_from_slice(interleaved),
        _ => {
            // Multi-channel: even channels fold left, odd channels fold right
            let pairs = channels as f32 / 2.0;
            out.reserve(interleaved.len() / channels * 2);
            for frame in interleaved.chunks_exact(channels) {
                let mut left_sum = 0.0f32;
                let mut right_sum = 0.0f32;
                for (ch_idx, &sample) in frame.iter().enumerate() {
                    if ch_idx % 2 == 0 {
                        left_sum += sample;
                    } else {
                        right_sum += sample;
                    }
                }
                out.push(left_sum / pairs);
                out.push(right_sum / pairs);
            }
        }
    }
}
