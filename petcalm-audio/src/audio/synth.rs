//! Procedural signal synthesis
//!
//! Noise kinds are precomputed into a fixed-length mono buffer that is
//! replayed as a seamless loop. Tone kinds (purr, binaural) run continuous
//! sine oscillators with no loop boundary.
//!
//! Every sample produced here lies in `[-1, 1]`.

use super::types::AudioFrame;
use petcalm_common::GeneratorKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

/// Default brown noise makeup gain (compensates energy lost by integration)
pub const DEFAULT_BROWN_GAIN: f32 = 3.5;

/// Default loop length for precomputed noise
pub const DEFAULT_NOISE_LOOP_SECONDS: f32 = 4.0;

/// Purr partials: (frequency Hz, relative amplitude)
pub const PURR_PARTIALS: [(f64, f64); 3] = [(100.0, 1.0), (200.0, 0.4), (400.0, 0.15)];

/// Binaural beat presets (carrier on the left ear, carrier + beat on the right)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BinauralPreset {
    #[default]
    Theta,
    Alpha,
    Delta,
}

impl BinauralPreset {
    pub const ALL: [BinauralPreset; 3] = [
        BinauralPreset::Theta,
        BinauralPreset::Alpha,
        BinauralPreset::Delta,
    ];

    pub fn carrier_hz(&self) -> f64 {
        match self {
            BinauralPreset::Theta => 200.0,
            BinauralPreset::Alpha => 200.0,
            BinauralPreset::Delta => 150.0,
        }
    }

    pub fn beat_hz(&self) -> f64 {
        match self {
            BinauralPreset::Theta => 5.0,
            BinauralPreset::Alpha => 10.0,
            BinauralPreset::Delta => 2.5,
        }
    }

    pub fn left_hz(&self) -> f64 {
        self.carrier_hz()
    }

    pub fn right_hz(&self) -> f64 {
        self.carrier_hz() + self.beat_hz()
    }
}

/// Tunables for noise synthesis
#[derive(Debug, Clone, Copy)]
pub struct NoiseParams {
    pub loop_seconds: f32,
    pub brown_gain: f32,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            loop_seconds: DEFAULT_NOISE_LOOP_SECONDS,
            brown_gain: DEFAULT_BROWN_GAIN,
        }
    }
}

impl NoiseParams {
    /// Buffer length in samples for a given sample rate (at least one sample)
    pub fn loop_len(&self, sample_rate: u32) -> usize {
        ((sample_rate as f64 * self.loop_seconds.max(0.0) as f64).round() as usize).max(1)
    }
}

fn white_sample<R: Rng>(rng: &mut R) -> f32 {
    rng.gen_range(-1.0f32..=1.0)
}

/// Uniform white noise in `[-1, 1]`
pub fn white_noise<R: Rng>(rng: &mut R, len: usize) -> Vec<f32> {
    (0..len).map(|_| white_sample(rng)).collect()
}

/// Leaky-integrated white noise with makeup gain
pub fn brown_noise<R: Rng>(rng: &mut R, len: usize, gain: f32) -> Vec<f32> {
    let mut last = 0.0f32;
    (0..len)
        .map(|_| {
            let white = white_sample(rng);
            last = (last + 0.02 * white) / 1.02;
            (last * gain).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Pink noise via Paul Kellet's refined filter
pub fn pink_noise<R: Rng>(rng: &mut R, len: usize) -> Vec<f32> {
    let (mut b0, mut b1, mut b2, mut b3, mut b4, mut b5, mut b6) =
        (0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32);

    (0..len)
        .map(|_| {
            let white = white_sample(rng);
            b0 = 0.99886 * b0 + white * 0.0555179;
            b1 = 0.99332 * b1 + white * 0.0750759;
            b2 = 0.96900 * b2 + white * 0.1538520;
            b3 = 0.86650 * b3 + white * 0.3104856;
            b4 = 0.55000 * b4 + white * 0.5329522;
            b5 = -0.7616 * b5 - white * 0.0168980;
            let out = (b0 + b1 + b2 + b3 + b4 + b5 + b6 + white * 0.5362) * 0.11;
            b6 = white * 0.115926;
            out.clamp(-1.0, 1.0)
        })
        .collect()
}

/// Precompute the loop buffer for a noise kind
///
/// Returns `None` for tone kinds, which have no buffer.
pub fn noise_buffer<R: Rng>(
    kind: GeneratorKind,
    sample_rate: u32,
    params: &NoiseParams,
    rng: &mut R,
) -> Option<Vec<f32>> {
    let len = params.loop_len(sample_rate);
    match kind {
        GeneratorKind::White => Some(white_noise(rng, len)),
        GeneratorKind::Brown => Some(brown_noise(rng, len, params.brown_gain)),
        GeneratorKind::Pink => Some(pink_noise(rng, len)),
        GeneratorKind::Purr | GeneratorKind::Binaural => None,
    }
}

/// Phase-accumulating sine oscillator
#[derive(Debug, Clone)]
pub struct SineOscillator {
    pub frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl SineOscillator {
    pub fn new(frequency: f64, sample_rate: u32) -> Self {
        SineOscillator {
            frequency,
            phase: 0.0,
            sample_rate: sample_rate.max(1) as f64,
        }
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let sample = (2.0 * PI * self.phase).sin();

        self.phase += self.frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }
}

/// Looping playback over a shared mono noise buffer
#[derive(Debug, Clone)]
pub struct NoiseLoop {
    buffer: Arc<Vec<f32>>,
    position: usize,
}

impl NoiseLoop {
    pub fn new(buffer: Vec<f32>) -> Self {
        Self {
            buffer: Arc::new(buffer),
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        let sample = self.buffer[self.position];
        self.position = (self.position + 1) % self.buffer.len();
        sample
    }
}

/// Continuous synthesized signal for one generator kind
#[derive(Debug, Clone)]
pub enum Signal {
    /// Mono noise loop duplicated to both channels
    Noise(NoiseLoop),
    /// Summed partials, normalised by the total amplitude
    Purr {
        partials: Vec<(SineOscillator, f64)>,
        norm: f64,
    },
    /// Independent left/right oscillators; never summed
    Binaural {
        left: SineOscillator,
        right: SineOscillator,
    },
}

impl Signal {
    /// Build the signal for a generator kind at a sample rate
    pub fn build<R: Rng>(
        kind: GeneratorKind,
        sample_rate: u32,
        params: &NoiseParams,
        preset: BinauralPreset,
        rng: &mut R,
    ) -> Self {
        match kind {
            GeneratorKind::Purr => Self::purr(sample_rate),
            GeneratorKind::Binaural => Self::binaural(preset, sample_rate),
            noise => Signal::Noise(NoiseLoop::new(
                noise_buffer(noise, sample_rate, params, rng).unwrap_or_default(),
            )),
        }
    }

    pub fn purr(sample_rate: u32) -> Self {
        let partials: Vec<(SineOscillator, f64)> = PURR_PARTIALS
            .iter()
            .map(|&(freq, amp)| (SineOscillator::new(freq, sample_rate), amp))
            .collect();
        let norm = PURR_PARTIALS.iter().map(|&(_, amp)| amp).sum();
        Signal::Purr { partials, norm }
    }

    pub fn binaural(preset: BinauralPreset, sample_rate: u32) -> Self {
        Signal::Binaural {
            left: SineOscillator::new(preset.left_hz(), sample_rate),
            right: SineOscillator::new(preset.right_hz(), sample_rate),
        }
    }

    /// Next stereo frame, clamped to `[-1, 1]`
    pub fn next_frame(&mut self) -> AudioFrame {
        let mut frame = match self {
            Signal::Noise(noise) => AudioFrame::from_mono(noise.next_sample()),
            Signal::Purr { partials, norm } => {
                let sum: f64 = partials
                    .iter_mut()
                    .map(|(osc, amp)| osc.next_sample() * *amp)
                    .sum();
                AudioFrame::from_mono((sum / *norm) as f32)
            }
            Signal::Binaural { left, right } => {
                AudioFrame::from_stereo(left.next_sample() as f32, right.next_sample() as f32)
            }
        };
        frame.clamp();
        frame
    }
}
