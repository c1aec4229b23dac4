//! Whole-asset sample rate conversion
//!
//! Assets are converted once, right after decoding, so the render path only
//! ever reads at the context rate (speed control aside). The asset is fed
//! through rubato in fixed-size chunks; the converter's delay is trimmed off
//! the front and the result is cut to exactly `frames × ratio` frames so a
//! looped asset keeps its length.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as _};
use tracing::debug;

/// Input frames handed to rubato per call
const CHUNK_FRAMES: usize = 1024;

pub struct Resampler;

impl Resampler {
    /// Convert interleaved `input` from `input_rate` to `output_rate`
    ///
    /// Equal rates return a copy; empty input returns an empty buffer.
    pub fn resample(input: &[f32], input_rate: u32, output_rate: u32, channels: u16) -> Result<Vec<f32>> {
        if channels == 0 || input_rate == 0 || output_rate == 0 {
            return Err(Error::Decode(format!(
                "Invalid resample parameters: {}Hz -> {}Hz, {} channels",
                input_rate, output_rate, channels
            )));
        }
        if input_rate == output_rate {
            return Ok(input.to_vec());
        }

        let channels = channels as usize;
        let planar = to_planar(input, channels);
        let frames_in = planar[0].len();
        if frames_in == 0 {
            return Ok(Vec::new());
        }

        let ratio = output_rate as f64 / input_rate as f64;
        let wanted = (frames_in as f64 * ratio).round() as usize;

        let mut converter =
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, CHUNK_FRAMES, channels)
                .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;
        let delay = converter.output_delay();
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted + delay); channels];

        let mut offset = 0;
        while offset < frames_in {
            let end = (offset + CHUNK_FRAMES).min(frames_in);
            let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[offset..end]).collect();

            let block = if end - offset == CHUNK_FRAMES {
                converter.process(&chunk, None)
            } else {
                converter.process_partial(Some(&chunk), None)
            }
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

            append(&mut output, block);
            offset = end;
        }

        // Flush the filter tail until the delayed output covers the asset
        while output[0].len() < wanted + delay {
            let block = converter
                .process_partial::<&[f32]>(None, None)
                .map_err(|e| Error::Decode(format!("Resampling flush failed: {}", e)))?;
            if block[0].is_empty() {
                break;
            }
            append(&mut output, block);
        }

        for ch in output.iter_mut() {
            ch.drain(..delay.min(ch.len()));
            ch.truncate(wanted);
        }

        debug!(
            "Resampled {} frames at {}Hz to {} frames at {}Hz",
            frames_in,
            input_rate,
            output[0].len(),
            output_rate
        );
        Ok(to_interleaved(&output))
    }
}

fn append(output: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (dst, src) in output.iter_mut().zip(block) {
        dst.extend(src);
    }
}

/// `[L, R, L, R, ..]` → `[[L, L, ..], [R, R, ..]]`; a trailing partial frame is dropped
fn to_planar(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in planar.iter_mut().zip(frame) {
            ch.push(sample);
        }
    }
    planar
}

fn to_interleaved(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    (0..frames)
        .flat_map(|i| planar.iter().map(move |ch| ch[i]))
        .collect()
}
