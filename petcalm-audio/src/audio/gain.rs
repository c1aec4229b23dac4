//! Pop-free gain control
//!
//! The control side stores a target gain in an atomic; the render side
//! ramps linearly toward it over a fixed window so volume changes never
//! step the waveform.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Clamp a requested volume into `[0, 1]`
///
/// NaN is treated as silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Control-side handle to a gain target (shared with the audio thread)
#[derive(Debug, Clone)]
pub struct GainHandle {
    target: Arc<AtomicU32>,
}

impl GainHandle {
    pub fn new(volume: f32) -> Self {
        Self {
            target: Arc::new(AtomicU32::new(clamp_volume(volume).to_bits())),
        }
    }

    /// Set new target volume (clamped to 0.0-1.0)
    pub fn set(&self, volume: f32) {
        self.target
            .store(clamp_volume(volume).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.target.load(Ordering::Relaxed))
    }
}

/// Render-side linear ramp toward the handle's target
#[derive(Debug)]
pub struct GainRamp {
    handle: GainHandle,
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_frames: u32,
}

impl GainRamp {
    /// Start at the handle's current target (no fade-in on start)
    pub fn new(handle: GainHandle, sample_rate: u32, ramp_ms: u32) -> Self {
        let initial = handle.get();
        let ramp_frames = ((sample_rate as u64 * ramp_ms as u64) / 1000).max(1) as u32;

        Self {
            handle,
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_frames,
        }
    }

    /// Gain for the next frame
    pub fn next_gain(&mut self) -> f32 {
        let target = self.handle.get();
        if target != self.target {
            self.target = target;
            self.remaining = self.ramp_frames;
            self.step = (target - self.current) / self.ramp_frames as f32;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                // Land exactly on the target
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }

        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(-0.5), 0.0);
        assert_eq!(clamp_volume(1.7), 1.0);
        assert_eq!(clamp_volume(0.3), 0.3);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
    }

    #[test]
    fn test_handle_clamps() {
        let handle = GainHandle::new(2.0);
        assert_eq!(handle.get(), 1.0);
        handle.set(-1.0);
        assert_eq!(handle.get(), 0.0);
    }

    #[test]
    fn test_ramp_reaches_target_linearly() {
        let handle = GainHandle::new(0.0);
        // 1000 Hz, 10 ms => 10 frame ramp
        let mut ramp = GainRamp::new(handle.clone(), 1000, 10);
        assert_eq!(ramp.next_gain(), 0.0);

        handle.set(1.0);
        let gains: Vec<f32> = (0..12).map(|_| ramp.next_gain()).collect();

        assert!((gains[0] - 0.1).abs() < 1e-5);
        assert!((gains[4] - 0.5).abs() < 1e-5);
        assert_eq!(gains[9], 1.0);
        assert_eq!(gains[11], 1.0);
        // Monotonic, no step larger than one ramp increment
        for pair in gains.windows(2) {
            assert!(pair[1] >= pair[0]);
            assert!(pair[1] - pair[0] <= 0.1 + 1e-5);
        }
    }

    #[test]
    fn test_ramp_retargets_mid_ramp() {
        let handle = GainHandle::new(1.0);
        let mut ramp = GainRamp::new(handle.clone(), 1000, 10);

        handle.set(0.0);
        for _ in 0..5 {
            ramp.next_gain();
        }
        assert!((ramp.current() - 0.5).abs() < 1e-5);

        handle.set(1.0);
        for _ in 0..20 {
            ramp.next_gain();
        }
        assert_eq!(ramp.current(), 1.0);
    }
}
