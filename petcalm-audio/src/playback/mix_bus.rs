//! Two-slot mix bus
//!
//! Owns the primary and secondary sessions plus the sleep timer, and
//! enforces the cross-slot rules: the secondary only plays alongside an
//! active primary and never duplicates the primary's descriptor. A failure
//! in one slot never touches the other.

use super::generator::GeneratorSettings;
use super::loader::AssetLoader;
use super::session::{PlaybackSession, SessionEnv};
use super::sleep_timer::{SleepTimer, SleepTimerPreset, TimerTick};
use super::state::{MixState, SleepTimerState};
use crate::audio::output::AudioHost;
use crate::audio::types::PcmBuffer;
use crate::config::EngineConfig;
use crate::error::Result;
use chrono::Utc;
use petcalm_common::{AudioEvent, EventBus, MixSlot, SoundDescriptor};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct MixBus {
    events: EventBus,
    primary: PlaybackSession,
    secondary: PlaybackSession,
    sleep_timer: SleepTimer,
}

impl MixBus {
    pub fn new(
        host: Arc<dyn AudioHost>,
        loader: Arc<dyn AssetLoader>,
        config: &EngineConfig,
        events: EventBus,
    ) -> Self {
        let env = SessionEnv {
            host,
            loader,
            generator: GeneratorSettings {
                noise: config.noise_params(),
                binaural: config.binaural_preset,
                ramp_ms: config.volume_ramp_ms,
            },
            events: events.clone(),
        };

        Self {
            primary: PlaybackSession::new(MixSlot::Primary, env.clone(), config.default_primary_volume),
            secondary: PlaybackSession::new(MixSlot::Secondary, env, config.default_secondary_volume),
            events,
            sleep_timer: SleepTimer::new(),
        }
    }

    fn session_mut(&mut self, slot: MixSlot) -> &mut PlaybackSession {
        match slot {
            MixSlot::Primary => &mut self.primary,
            MixSlot::Secondary => &mut self.secondary,
        }
    }

    /// Select the primary sound
    ///
    /// If the same descriptor currently sits on the secondary slot, the
    /// secondary is cleared first so the two slots never share an id.
    pub fn play_primary(&mut self, descriptor: &SoundDescriptor) -> MixState {
        if self.secondary.sound_id() == Some(descriptor.id.as_str()) {
            info!("Clearing secondary {} before promoting it to primary", descriptor.id);
            self.secondary.clear();
        }
        self.primary.select(descriptor);
        self.state()
    }

    pub fn toggle_primary_pause(&mut self) -> MixState {
        self.primary.toggle_pause();
        self.state()
    }

    pub fn set_primary_volume(&mut self, volume: f32) -> MixState {
        self.primary.set_volume(volume);
        self.state()
    }

    pub fn set_primary_speed(&mut self, speed: f32) -> MixState {
        self.primary.set_speed(speed);
        self.state()
    }

    /// Stop the primary; the secondary keeps playing
    pub fn stop_primary(&mut self) -> MixState {
        self.primary.stop();
        self.state()
    }

    /// Add, replace, or remove the secondary layer
    ///
    /// Toggling the active secondary clears it; toggling one left idle by
    /// stop-all restarts it. A descriptor matching the primary, or any
    /// selection while the primary is inactive, is rejected with the mix left
    /// unchanged.
    pub fn toggle_secondary(&mut self, descriptor: &SoundDescriptor) -> MixState {
        if self.secondary.sound_id() == Some(descriptor.id.as_str()) && self.secondary.status().is_active() {
            info!("Removing secondary layer {}", descriptor.id);
            self.secondary.clear();
            return self.state();
        }

        if self.primary.sound_id() == Some(descriptor.id.as_str()) {
            self.reject(MixSlot::Secondary, format!("{} is already the primary sound", descriptor.id));
            return self.state();
        }

        if !self.primary.status().is_active() {
            self.reject(MixSlot::Secondary, "secondary layer requires an active primary sound".to_string());
            return self.state();
        }

        self.secondary.select(descriptor);
        self.state()
    }

    pub fn set_secondary_volume(&mut self, volume: f32) -> MixState {
        self.secondary.set_volume(volume);
        self.state()
    }

    /// Stop both slots unconditionally
    ///
    /// Slots keep their descriptors (status idle) so they can be restarted.
    pub fn stop_all(&mut self) -> MixState {
        self.primary.stop();
        self.secondary.stop();
        info!("All playback stopped");
        self.events.emit_lossy(AudioEvent::AllStopped {
            timestamp: Utc::now(),
        });
        self.state()
    }

    pub fn set_sleep_timer(&mut self, preset: SleepTimerPreset) -> SleepTimerState {
        let state = self.sleep_timer.set(preset);
        self.emit_timer(state);
        state
    }

    /// Advance the sleep timer by one minute, stopping everything at zero
    pub fn sleep_timer_tick(&mut self) -> TimerTick {
        let tick = self.sleep_timer.tick();
        match tick {
            TimerTick::Inactive => {}
            TimerTick::Remaining(_) => self.emit_timer(self.sleep_timer.state()),
            TimerTick::Elapsed => {
                self.events.emit_lossy(AudioEvent::SleepTimerElapsed {
                    timestamp: Utc::now(),
                });
                self.stop_all();
                self.emit_timer(self.sleep_timer.state());
            }
        }
        tick
    }

    pub fn sleep_timer_state(&self) -> SleepTimerState {
        self.sleep_timer.state()
    }

    /// Route a finished asset load to its slot
    pub fn complete_load(&mut self, slot: MixSlot, token: Uuid, result: Result<PcmBuffer>) -> bool {
        let accepted = self.session_mut(slot).complete_load(token, result);
        if !accepted {
            debug!("Load for {} slot discarded", slot);
        }
        accepted
    }

    pub fn state(&self) -> MixState {
        MixState {
            primary: self.primary.state(),
            secondary: self.secondary.state(),
        }
    }

    /// Stop everything and cancel the sleep timer
    pub fn teardown(&mut self) {
        self.sleep_timer.cancel();
        self.stop_all();
    }

    fn reject(&self, slot: MixSlot, reason: String) {
        warn!("Rejected {} command: {}", slot, reason);
        self.events.emit_lossy(AudioEvent::CommandRejected {
            slot,
            reason,
            timestamp: Utc::now(),
        });
    }

    fn emit_timer(&self, state: SleepTimerState) {
        self.events.emit_lossy(AudioEvent::SleepTimerChanged {
            remaining_minutes: state.remaining_minutes,
            timestamp: Utc::now(),
        });
    }
}
