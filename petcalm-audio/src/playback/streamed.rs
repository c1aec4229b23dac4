//! Streamed asset producer
//!
//! Plays a decoded, resampled asset in a seamless loop. The asset arrives
//! asynchronously; until then the source is buffering and remembers any
//! pause request so it can be applied once the asset attaches.

use crate::audio::gain::{clamp_volume, GainHandle, GainRamp};
use crate::audio::output::{AudioHost, RenderContext, RenderFn};
use crate::audio::types::{AudioFrame, PcmBuffer};
use crate::error::Result;
use crate::playback::state::clamp_speed;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Streamed source lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamedState {
    /// Waiting for asset bytes; no timeout applies
    Buffering,
    Playing,
    Paused,
    /// Fetch or decode failed; terminal until re-selection
    Failed(String),
    Stopped,
}

pub struct StreamedSource {
    host: Arc<dyn AudioHost>,
    ramp_ms: u32,
    state: StreamedState,
    context: Option<Box<dyn RenderContext>>,
    gain: GainHandle,
    speed: Arc<AtomicU32>,
    pause_pending: bool,
}

impl StreamedSource {
    /// New source in the buffering state
    pub fn new(host: Arc<dyn AudioHost>, volume: f32, speed: f32, ramp_ms: u32) -> Self {
        Self {
            host,
            ramp_ms,
            state: StreamedState::Buffering,
            context: None,
            gain: GainHandle::new(volume),
            speed: Arc::new(AtomicU32::new(clamp_speed(speed).to_bits())),
            pause_pending: false,
        }
    }

    pub fn state(&self) -> &StreamedState {
        &self.state
    }

    /// Attach the loaded asset and begin (or stay paused)
    ///
    /// Ignored unless the source is still buffering.
    pub fn attach(&mut self, pcm: PcmBuffer, label: &str) -> Result<()> {
        if self.state != StreamedState::Buffering {
            debug!("{}: ignoring asset for source in state {:?}", label, self.state);
            return Ok(());
        }

        let mut context = self.host.open(label)?;
        let sample_rate = context.sample_rate();

        let mut ramp = GainRamp::new(self.gain.clone(), sample_rate, self.ramp_ms);
        let speed = Arc::clone(&self.speed);
        let mut position = 0.0f64;
        let frame_count = pcm.frame_count as f64;

        let render: RenderFn = Box::new(move |frames: &mut [AudioFrame]| {
            let rate = f32::from_bits(speed.load(Ordering::Relaxed)) as f64;
            for frame in frames.iter_mut() {
                let mut next = pcm.frame_at(position);
                next.apply_volume(ramp.next_gain());
                next.clamp();
                *frame = next;

                position += rate;
                if frame_count > 0.0 && position >= frame_count {
                    position -= frame_count;
                }
            }
        });

        context.start(render)?;

        let paused = self.pause_pending
            && match context.suspend() {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}: deferred pause failed: {}", label, e);
                    false
                }
            };
        if paused {
            self.state = StreamedState::Paused;
            info!("{}: asset attached (paused)", label);
        } else {
            self.state = StreamedState::Playing;
            info!("{}: asset attached, playing", label);
        }
        self.pause_pending = false;
        self.context = Some(context);
        Ok(())
    }

    pub fn pause(&mut self) {
        match self.state {
            StreamedState::Buffering => self.pause_pending = true,
            StreamedState::Playing => {
                if let Some(context) = self.context.as_mut() {
                    if let Err(e) = context.suspend() {
                        warn!("{}: suspend failed: {}", context.label(), e);
                        return;
                    }
                }
                self.state = StreamedState::Paused;
            }
            _ => {}
        }
    }

    pub fn resume(&mut self) {
        match self.state {
            StreamedState::Buffering => self.pause_pending = false,
            StreamedState::Paused => {
                if let Some(context) = self.context.as_mut() {
                    if let Err(e) = context.resume() {
                        warn!("{}: resume failed: {}", context.label(), e);
                        return;
                    }
                }
                self.state = StreamedState::Playing;
            }
            _ => {}
        }
    }

    /// Whether a pause was requested before the asset arrived
    pub fn pause_pending(&self) -> bool {
        self.pause_pending
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.gain.set(volume);
        volume
    }

    /// Set playback rate (clamped); returns the stored value
    pub fn set_speed(&mut self, speed: f32) -> f32 {
        let speed = clamp_speed(speed);
        self.speed.store(speed.to_bits(), Ordering::Relaxed);
        speed
    }

    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed.load(Ordering::Relaxed))
    }

    /// Enter the terminal failed state, releasing any context
    pub fn fail(&mut self, message: String) {
        self.release();
        self.state = StreamedState::Failed(message);
    }

    /// Release the context; safe to call repeatedly
    pub fn stop(&mut self) {
        self.release();
        self.state = StreamedState::Stopped;
    }

    fn release(&mut self) {
        if let Some(mut context) = self.context.take() {
            debug!("{}: closing stream context", context.label());
            context.close();
        }
        self.pause_pending = false;
    }
}

impl Drop for StreamedSource {
    fn drop(&mut self) {
        self.release();
    }
}
