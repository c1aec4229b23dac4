//! Stereo frame and loopable PCM asset

/// A decoded asset at the host rate, interleaved stereo f32
///
/// Built once per load and only read afterwards; the render closure owns it.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,

    pub sample_rate: u32,

    /// Whole stereo frames in `samples`
    pub frame_count: usize,
}

impl PcmBuffer {
    /// Wrap interleaved stereo samples; an odd trailing sample is discarded
    pub fn new(mut samples: Vec<f32>, sample_rate: u32) -> Self {
        let frame_count = samples.len() / 2;
        samples.truncate(frame_count * 2);
        Self {
            samples,
            sample_rate,
            frame_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    pub fn duration_seconds(&self) -> f32 {
        match self.sample_rate {
            0 => 0.0,
            rate => self.frame_count as f32 / rate as f32,
        }
    }

    fn frame(&self, index: usize) -> AudioFrame {
        match self.samples.get(index * 2..index * 2 + 2) {
            Some(&[left, right]) => AudioFrame::from_stereo(left, right),
            _ => AudioFrame::zero(),
        }
    }

    /// Sample the loop at a fractional frame position
    ///
    /// Positions outside `[0, frame_count)` wrap, and the last frame blends
    /// into the first so speed-shifted loops have no seam.
    pub fn frame_at(&self, position: f64) -> AudioFrame {
        if self.frame_count == 0 {
            return AudioFrame::zero();
        }

        let wrapped = position.rem_euclid(self.frame_count as f64);
        let base = wrapped.trunc();
        let index = (base as usize).min(self.frame_count - 1);
        let t = (wrapped - base) as f32;

        self.frame(index).lerp(self.frame((index + 1) % self.frame_count), t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioFrame {
    pub left: f32,
    pub right: f32,
}

impl AudioFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_mono(value: f32) -> Self {
        Self::from_stereo(value, value)
    }

    pub fn from_stereo(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    fn lerp(self, to: AudioFrame, t: f32) -> AudioFrame {
        AudioFrame {
            left: self.left + (to.left - self.left) * t,
            right: self.right + (to.right - self.right) * t,
        }
    }

    pub fn apply_volume(&mut self, gain: f32) {
        self.left *= gain;
        self.right *= gain;
    }

    /// Hard-limit both channels to full scale
    pub fn clamp(&mut self) {
        *self = Self::from_stereo(self.left.clamp(-1.0, 1.0), self.right.clamp(-1.0, 1.0));
    }

    /// Fill one interleaved device frame
    ///
    /// Mono devices get the channel average. Channels past the second are silenced.
    pub fn write_to(&self, out: &mut [f32]) {
        match out {
            [] => {}
            [mono] => *mono = (self.left + self.right) * 0.5,
            [left, right, rest @ ..] => {
                *left = self.left;
                *right = self.right;
                rest.fill(0.0);
            }
        }
    }
}
