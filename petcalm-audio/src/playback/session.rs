//! Playback session: one mix slot's producer lifecycle
//!
//! Explicit state machine `idle → loading → playing ⇄ paused`, with `error`
//! reachable from loading/playing and left again only by re-selection or
//! stop. A session owns at most one producer; selecting a new descriptor
//! tears the old producer down completely (context closed, pending load
//! abandoned, token rotated) before the next is constructed.

use super::generator::{GeneratorSettings, SignalGenerator};
use super::loader::{AssetLoader, LoadRequest, LoadTicket};
use super::state::{clamp_speed, PlaybackState, DEFAULT_SPEED};
use super::streamed::{StreamedSource, StreamedState};
use crate::audio::gain::clamp_volume;
use crate::audio::output::AudioHost;
use crate::audio::types::PcmBuffer;
use crate::error::{Error, Result};
use chrono::Utc;
use petcalm_common::{AudioEvent, EventBus, FailureKind, MixSlot, PlaybackStatus, SoundDescriptor, SoundSource};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collaborators shared by both sessions of a mix bus
#[derive(Clone)]
pub struct SessionEnv {
    pub host: Arc<dyn AudioHost>,
    pub loader: Arc<dyn AssetLoader>,
    pub generator: GeneratorSettings,
    pub events: EventBus,
}

enum Producer {
    None,
    Generator(SignalGenerator),
    Streamed(StreamedSource),
}

pub struct PlaybackSession {
    slot: MixSlot,
    env: SessionEnv,
    descriptor: Option<SoundDescriptor>,
    status: PlaybackStatus,
    volume: f32,
    speed: f32,
    error_message: Option<String>,
    error_kind: Option<FailureKind>,
    /// Identifies the current selection; load results carry it back
    token: Uuid,
    producer: Producer,
    ticket: Option<LoadTicket>,
}

impl PlaybackSession {
    pub fn new(slot: MixSlot, env: SessionEnv, default_volume: f32) -> Self {
        Self {
            slot,
            env,
            descriptor: None,
            status: PlaybackStatus::Idle,
            volume: clamp_volume(default_volume),
            speed: DEFAULT_SPEED,
            error_message: None,
            error_kind: None,
            token: Uuid::nil(),
            producer: Producer::None,
            ticket: None,
        }
    }

    pub fn slot(&self) -> MixSlot {
        self.slot
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn descriptor(&self) -> Option<&SoundDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn sound_id(&self) -> Option<&str> {
        self.descriptor.as_ref().map(|d| d.id.as_str())
    }

    fn label(&self) -> String {
        format!("{}:{}", self.slot, self.sound_id().unwrap_or("-"))
    }

    /// Select a descriptor for this slot
    ///
    /// Re-selecting the active descriptor is a no-op; re-selecting an idle
    /// or errored one retries from scratch.
    pub fn select(&mut self, descriptor: &SoundDescriptor) {
        if self.sound_id() == Some(descriptor.id.as_str()) && self.status.is_active() {
            debug!("{}: already active, ignoring selection", self.label());
            return;
        }

        self.teardown();

        self.descriptor = Some(descriptor.clone());
        self.token = Uuid::new_v4();
        self.error_message = None;
        self.error_kind = None;
        self.speed = DEFAULT_SPEED;

        let label = self.label();
        info!("{}: selected '{}'", label, descriptor.title);

        match &descriptor.source {
            SoundSource::Generated { generator } => {
                let mut producer = SignalGenerator::new(Arc::clone(&self.env.host), self.env.generator);
                match producer.play(*generator, self.volume, &label) {
                    Ok(()) => {
                        self.producer = Producer::Generator(producer);
                        self.set_status(PlaybackStatus::Playing);
                    }
                    Err(e) => self.fail(e),
                }
            }
            SoundSource::File { url } => {
                let source = StreamedSource::new(
                    Arc::clone(&self.env.host),
                    self.volume,
                    self.speed,
                    self.env.generator.ramp_ms,
                );
                self.producer = Producer::Streamed(source);
                self.set_status(PlaybackStatus::Loading);
                self.ticket = Some(self.env.loader.load(LoadRequest {
                    slot: self.slot,
                    token: self.token,
                    sound_id: descriptor.id.clone(),
                    url: url.clone(),
                    target_rate: self.env.host.sample_rate(),
                }));
            }
        }
    }

    /// Deliver a finished asset load
    ///
    /// Returns false when the result belongs to an abandoned selection.
    pub fn complete_load(&mut self, token: Uuid, result: Result<PcmBuffer>) -> bool {
        if token != self.token || self.status != PlaybackStatus::Loading {
            debug!("{}: discarding stale load (token {})", self.label(), token);
            return false;
        }

        self.ticket = None;
        let label = self.label();

        let pcm = match result {
            Ok(pcm) => pcm,
            Err(e) => {
                self.fail(e);
                return true;
            }
        };

        let attached = match &mut self.producer {
            Producer::Streamed(source) => source
                .attach(pcm, &label)
                .map(|()| source.state() == &StreamedState::Paused),
            _ => Err(Error::Decode(format!("{}: no streamed producer to attach", label))),
        };

        match attached {
            Ok(true) => self.set_status(PlaybackStatus::Paused),
            Ok(false) => self.set_status(PlaybackStatus::Playing),
            Err(e) => self.fail(e),
        }
        true
    }

    /// Pause a playing session, resume a paused one
    ///
    /// While loading, the request is remembered and applied on attach.
    pub fn toggle_pause(&mut self) {
        match (self.status, &mut self.producer) {
            (PlaybackStatus::Playing, Producer::Generator(generator)) => {
                generator.pause();
                if !generator.is_playing() {
                    self.set_status(PlaybackStatus::Paused);
                }
            }
            (PlaybackStatus::Paused, Producer::Generator(generator)) => {
                generator.resume();
                if generator.is_playing() {
                    self.set_status(PlaybackStatus::Playing);
                }
            }
            (PlaybackStatus::Playing, Producer::Streamed(source)) => {
                source.pause();
                if source.state() == &StreamedState::Paused {
                    self.set_status(PlaybackStatus::Paused);
                }
            }
            (PlaybackStatus::Paused, Producer::Streamed(source)) => {
                source.resume();
                if source.state() == &StreamedState::Playing {
                    self.set_status(PlaybackStatus::Playing);
                }
            }
            (PlaybackStatus::Loading, Producer::Streamed(source)) => {
                if source.pause_pending() {
                    source.resume();
                } else {
                    source.pause();
                }
                debug!("pause pending while loading: {}", source.pause_pending());
            }
            _ => debug!("{}: pause toggle ignored in {}", self.label(), self.status),
        }
    }

    /// Store the clamped volume; it persists across selections
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.volume = volume;

        match &mut self.producer {
            Producer::Generator(generator) => {
                generator.set_volume(volume);
            }
            Producer::Streamed(source) => {
                source.set_volume(volume);
            }
            Producer::None => {}
        }

        self.env.events.emit_lossy(AudioEvent::VolumeChanged {
            slot: self.slot,
            volume,
            timestamp: Utc::now(),
        });
        volume
    }

    /// Set playback rate for file sources; generated sources ignore it
    pub fn set_speed(&mut self, speed: f32) -> Option<f32> {
        let is_file = matches!(
            self.descriptor.as_ref().map(|d| &d.source),
            Some(SoundSource::File { .. })
        );
        if !is_file {
            debug!("{}: speed ignored for non-file source", self.label());
            return None;
        }

        let speed = clamp_speed(speed);
        self.speed = speed;
        if let Producer::Streamed(source) = &mut self.producer {
            source.set_speed(speed);
        }
        Some(speed)
    }

    /// Release the producer and go idle; safe to call repeatedly
    pub fn stop(&mut self) {
        if self.descriptor.is_none() {
            return;
        }
        self.teardown();
        self.error_message = None;
        self.error_kind = None;
        self.set_status(PlaybackStatus::Idle);
    }

    /// Stop and forget the descriptor (slot becomes empty)
    pub fn clear(&mut self) {
        self.stop();
        self.descriptor = None;
    }

    fn fail(&mut self, err: Error) {
        self.teardown();

        let kind = err.failure_kind();
        let message = err.to_string();
        warn!("{}: {} ({})", self.label(), message, kind);

        self.error_message = Some(message.clone());
        self.error_kind = Some(kind);
        self.set_status(PlaybackStatus::Error);

        self.env.events.emit_lossy(AudioEvent::SessionFailed {
            slot: self.slot,
            sound_id: self.sound_id().unwrap_or_default().to_string(),
            kind,
            message,
            timestamp: Utc::now(),
        });
    }

    /// Abandon any pending load and close the producer's context
    fn teardown(&mut self) {
        if self.ticket.take().is_some() {
            debug!("{}: abandoning pending load", self.label());
        }

        match std::mem::replace(&mut self.producer, Producer::None) {
            Producer::Generator(mut generator) => generator.stop(),
            Producer::Streamed(mut source) => source.stop(),
            Producer::None => {}
        }
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        if self.status == status {
            return;
        }
        debug!("{}: {} -> {}", self.label(), self.status, status);
        self.status = status;

        self.env.events.emit_lossy(AudioEvent::SessionStatusChanged {
            slot: self.slot,
            sound_id: self.sound_id().unwrap_or_default().to_string(),
            status,
            timestamp: Utc::now(),
        });
    }

    /// Snapshot for callers; `None` when the slot is empty
    pub fn state(&self) -> Option<PlaybackState> {
        let descriptor = self.descriptor.clone()?;
        let speed = if descriptor.is_generated() {
            DEFAULT_SPEED
        } else {
            self.speed
        };

        Some(PlaybackState {
            descriptor,
            status: self.status,
            volume: self.volume,
            speed,
            error_message: self.error_message.clone(),
            error_kind: self.error_kind,
        })
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
