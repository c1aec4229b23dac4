//! Signal generator producer
//!
//! Owns one render context per `play()`; `stop()` releases it. Pause and
//! resume suspend the context itself so no synthesis runs while paused.

use crate::audio::gain::{clamp_volume, GainHandle, GainRamp};
use crate::audio::output::{AudioHost, RenderContext, RenderFn};
use crate::audio::synth::{BinauralPreset, NoiseParams, Signal};
use crate::audio::types::AudioFrame;
use crate::error::{Error, Result};
use petcalm_common::GeneratorKind;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Synthesis settings shared by every generator of an engine
#[derive(Debug, Clone, Copy)]
pub struct GeneratorSettings {
    pub noise: NoiseParams,
    pub binaural: BinauralPreset,
    pub ramp_ms: u32,
}

pub struct SignalGenerator {
    host: Arc<dyn AudioHost>,
    settings: GeneratorSettings,
    context: Option<Box<dyn RenderContext>>,
    gain: GainHandle,
    kind: Option<GeneratorKind>,
    playing: bool,
}

impl SignalGenerator {
    pub fn new(host: Arc<dyn AudioHost>, settings: GeneratorSettings) -> Self {
        Self {
            host,
            settings,
            context: None,
            gain: GainHandle::new(0.0),
            kind: None,
            playing: false,
        }
    }

    /// Stop any prior signal, then synthesize `kind` on a fresh context
    pub fn play(&mut self, kind: GeneratorKind, initial_volume: f32, label: &str) -> Result<()> {
        self.stop();

        if !self.host.supports_generation() {
            return Err(Error::GenerationUnsupported(format!(
                "no synthesis context available for {}",
                kind
            )));
        }

        let mut context = self.host.open(label)?;
        let sample_rate = context.sample_rate();

        let mut rng = StdRng::from_entropy();
        let mut signal = Signal::build(
            kind,
            sample_rate,
            &self.settings.noise,
            self.settings.binaural,
            &mut rng,
        );

        let gain = GainHandle::new(initial_volume);
        let mut ramp = GainRamp::new(gain.clone(), sample_rate, self.settings.ramp_ms);

        let render: RenderFn = Box::new(move |frames: &mut [AudioFrame]| {
            for frame in frames.iter_mut() {
                let mut next = signal.next_frame();
                next.apply_volume(ramp.next_gain());
                *frame = next;
            }
        });

        context.start(render)?;

        info!("{}: generating {} at volume {:.2}", label, kind, gain.get());
        self.context = Some(context);
        self.gain = gain;
        self.kind = Some(kind);
        self.playing = true;
        Ok(())
    }

    pub fn pause(&mut self) {
        if let Some(context) = self.context.as_mut() {
            if self.playing {
                match context.suspend() {
                    Ok(()) => self.playing = false,
                    Err(e) => warn!("{}: suspend failed: {}", context.label(), e),
                }
            }
        }
    }

    pub fn resume(&mut self) {
        if let Some(context) = self.context.as_mut() {
            if !self.playing {
                match context.resume() {
                    Ok(()) => self.playing = true,
                    Err(e) => warn!("{}: resume failed: {}", context.label(), e),
                }
            }
        }
    }

    /// Set gain target (clamped); returns the stored value
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.gain.set(volume);
        volume
    }

    /// Release the context; safe to call repeatedly
    pub fn stop(&mut self) {
        if let Some(mut context) = self.context.take() {
            debug!("{}: closing generator context", context.label());
            context.close();
        }
        self.playing = false;
        self.kind = None;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn kind(&self) -> Option<GeneratorKind> {
        self.kind
    }
}

impl Drop for SignalGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}
