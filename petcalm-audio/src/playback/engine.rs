//! Audio engine loop
//!
//! One tokio task owns the `MixBus` and is the only writer of mix state.
//! Callers talk to it through a cloneable `EngineHandle`: every command is
//! queued on an unbounded channel and answered over a oneshot with the
//! resulting state. Asset loads finish on their own tasks and come back as
//! internal `Loaded` commands. Sleep-timer ticks come from a one-minute
//! interval that only exists while a countdown is running.

use super::loader::{AssetLoader, CacheLoader, LoadOutcome};
use super::mix_bus::MixBus;
use super::sleep_timer::SleepTimerPreset;
use super::state::{EngineSnapshot, MixState, SleepTimerState};
use crate::audio::output::AudioHost;
use crate::cache::OfflineAssetCache;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::state::{Capabilities, SharedState};
use petcalm_common::{AudioEvent, EventBus, SoundDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Sleep timer resolution
pub const SLEEP_TICK_PERIOD: Duration = Duration::from_secs(60);

pub(crate) enum Command {
    PlayPrimary {
        descriptor: SoundDescriptor,
        reply: oneshot::Sender<MixState>,
    },
    TogglePrimaryPause {
        reply: oneshot::Sender<MixState>,
    },
    SetPrimaryVolume {
        volume: f32,
        reply: oneshot::Sender<MixState>,
    },
    SetPrimarySpeed {
        speed: f32,
        reply: oneshot::Sender<MixState>,
    },
    StopPrimary {
        reply: oneshot::Sender<MixState>,
    },
    ToggleSecondary {
        descriptor: SoundDescriptor,
        reply: oneshot::Sender<MixState>,
    },
    SetSecondaryVolume {
        volume: f32,
        reply: oneshot::Sender<MixState>,
    },
    SetSleepTimer {
        preset: SleepTimerPreset,
        reply: oneshot::Sender<SleepTimerState>,
    },
    StopAll {
        reply: oneshot::Sender<MixState>,
    },
    MixState {
        reply: oneshot::Sender<MixState>,
    },
    SleepTimerState {
        reply: oneshot::Sender<SleepTimerState>,
    },
    /// Asset load finished (internal)
    Loaded(LoadOutcome),
    Shutdown {
        reply: oneshot::Sender<MixState>,
    },
}

/// Cloneable command surface of a running engine
///
/// Every method fails with `Error::EngineClosed` once the loop is gone;
/// playback failures are reported in the returned state instead.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<SharedState>,
}

impl EngineHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| Error::EngineClosed)?;
        response.await.map_err(|_| Error::EngineClosed)
    }

    pub async fn play_primary(&self, descriptor: SoundDescriptor) -> Result<MixState> {
        self.request(|reply| Command::PlayPrimary { descriptor, reply })
            .await
    }

    pub async fn toggle_primary_pause(&self) -> Result<MixState> {
        self.request(|reply| Command::TogglePrimaryPause { reply }).await
    }

    pub async fn set_primary_volume(&self, volume: f32) -> Result<MixState> {
        self.request(|reply| Command::SetPrimaryVolume { volume, reply })
            .await
    }

    pub async fn set_primary_speed(&self, speed: f32) -> Result<MixState> {
        self.request(|reply| Command::SetPrimarySpeed { speed, reply })
            .await
    }

    pub async fn stop_primary(&self) -> Result<MixState> {
        self.request(|reply| Command::StopPrimary { reply }).await
    }

    pub async fn toggle_secondary(&self, descriptor: SoundDescriptor) -> Result<MixState> {
        self.request(|reply| Command::ToggleSecondary { descriptor, reply })
            .await
    }

    pub async fn set_secondary_volume(&self, volume: f32) -> Result<MixState> {
        self.request(|reply| Command::SetSecondaryVolume { volume, reply })
            .await
    }

    pub async fn set_sleep_timer(&self, preset: SleepTimerPreset) -> Result<SleepTimerState> {
        self.request(|reply| Command::SetSleepTimer { preset, reply })
            .await
    }

    pub async fn stop_all(&self) -> Result<MixState> {
        self.request(|reply| Command::StopAll { reply }).await
    }

    pub async fn mix_state(&self) -> Result<MixState> {
        self.request(|reply| Command::MixState { reply }).await
    }

    pub async fn sleep_timer_state(&self) -> Result<SleepTimerState> {
        self.request(|reply| Command::SleepTimerState { reply }).await
    }

    pub fn capabilities(&self) -> Capabilities {
        self.shared.capabilities
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AudioEvent> {
        self.shared.subscribe_events()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<EngineSnapshot> {
        self.shared.subscribe_snapshots()
    }

    /// Latest published snapshot, without a round trip through the loop
    pub fn snapshot(&self) -> EngineSnapshot {
        self.shared.snapshot()
    }
}

/// Process-scoped engine: explicit `init()` and `teardown()`
pub struct AudioEngine {
    handle: EngineHandle,
    join: Option<JoinHandle<()>>,
}

impl AudioEngine {
    /// Spawn the engine loop, loading file assets through `cache`
    ///
    /// Engine events share the cache's bus, so subscribers also see cache
    /// install/activate events. Must be called from within a tokio runtime.
    pub fn init(host: Arc<dyn AudioHost>, cache: Arc<OfflineAssetCache>, config: &EngineConfig) -> Self {
        let events = cache.event_bus().clone();
        Self::spawn(host, config, events, move |commands| {
            Arc::new(CacheLoader::new(cache, commands.downgrade(), Command::Loaded))
        })
    }

    /// Spawn the engine loop with a caller-supplied asset loader
    pub fn init_with_loader(
        host: Arc<dyn AudioHost>,
        loader: Arc<dyn AssetLoader>,
        config: &EngineConfig,
    ) -> Self {
        Self::spawn(host, config, EventBus::new(config.event_capacity), move |_| loader)
    }

    fn spawn(
        host: Arc<dyn AudioHost>,
        config: &EngineConfig,
        events: EventBus,
        make_loader: impl FnOnce(&mpsc::UnboundedSender<Command>) -> Arc<dyn AssetLoader>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let capabilities = Capabilities {
            generation_supported: host.supports_generation(),
            sample_rate: host.sample_rate(),
        };
        let shared = Arc::new(SharedState::with_events(capabilities, events));

        let loader = make_loader(&commands_tx);
        let bus = MixBus::new(host, loader, config, shared.events.clone());

        info!(
            "Audio engine starting ({} Hz, generation {})",
            capabilities.sample_rate,
            if capabilities.generation_supported { "available" } else { "unavailable" }
        );

        let engine_loop = EngineLoop {
            bus,
            commands: commands_rx,
            shared: Arc::clone(&shared),
            sleep_tick: None,
        };
        let join = tokio::spawn(engine_loop.run());

        Self {
            handle: EngineHandle {
                commands: commands_tx,
                shared,
            },
            join: Some(join),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop all playback, release every context and join the loop
    pub async fn teardown(mut self) -> Result<()> {
        let stopped = self
            .handle
            .request(|reply| Command::Shutdown { reply })
            .await;
        if let Err(e) = &stopped {
            warn!("Engine loop already closed at teardown: {}", e);
        }

        if let Some(join) = self.join.take() {
            join.await
                .map_err(|e| Error::AudioOutput(format!("Engine loop panicked: {}", e)))?;
        }
        info!("Audio engine torn down");
        Ok(())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if self.join.is_some() {
            let (reply, _) = oneshot::channel();
            let _ = self.handle.commands.send(Command::Shutdown { reply });
        }
    }
}

struct EngineLoop {
    bus: MixBus,
    commands: mpsc::UnboundedReceiver<Command>,
    shared: Arc<SharedState>,
    sleep_tick: Option<Interval>,
}

impl EngineLoop {
    async fn run(mut self) {
        debug!("Engine loop running");
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown { reply }) => {
                            self.bus.teardown();
                            self.sleep_tick = None;
                            self.publish();
                            let _ = reply.send(self.bus.state());
                            break;
                        }
                        Some(command) => self.handle(command),
                        None => {
                            debug!("All engine handles dropped");
                            self.bus.teardown();
                            break;
                        }
                    }
                }

                _ = next_tick(&mut self.sleep_tick) => {
                    self.bus.sleep_timer_tick();
                    if !self.bus.sleep_timer_state().active {
                        self.sleep_tick = None;
                    }
                    self.publish();
                }
            }
        }
        debug!("Engine loop exited");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::PlayPrimary { descriptor, reply } => {
                let _ = reply.send(self.bus.play_primary(&descriptor));
            }
            Command::TogglePrimaryPause { reply } => {
                let _ = reply.send(self.bus.toggle_primary_pause());
            }
            Command::SetPrimaryVolume { volume, reply } => {
                let _ = reply.send(self.bus.set_primary_volume(volume));
            }
            Command::SetPrimarySpeed { speed, reply } => {
                let _ = reply.send(self.bus.set_primary_speed(speed));
            }
            Command::StopPrimary { reply } => {
                let _ = reply.send(self.bus.stop_primary());
            }
            Command::ToggleSecondary { descriptor, reply } => {
                let _ = reply.send(self.bus.toggle_secondary(&descriptor));
            }
            Command::SetSecondaryVolume { volume, reply } => {
                let _ = reply.send(self.bus.set_secondary_volume(volume));
            }
            Command::SetSleepTimer { preset, reply } => {
                let state = self.bus.set_sleep_timer(preset);
                self.sleep_tick = state.active.then(new_sleep_tick);
                let _ = reply.send(state);
            }
            Command::StopAll { reply } => {
                let _ = reply.send(self.bus.stop_all());
            }
            Command::MixState { reply } => {
                let _ = reply.send(self.bus.state());
            }
            Command::SleepTimerState { reply } => {
                let _ = reply.send(self.bus.sleep_timer_state());
            }
            Command::Loaded(outcome) => {
                self.bus
                    .complete_load(outcome.slot, outcome.token, outcome.result);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(self.bus.state());
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.shared.publish(EngineSnapshot {
            mix: self.bus.state(),
            sleep_timer: self.bus.sleep_timer_state(),
        });
    }
}

/// First tick one full period after the timer is set
fn new_sleep_tick() -> Interval {
    let mut interval = interval_at(Instant::now() + SLEEP_TICK_PERIOD, SLEEP_TICK_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::offline::OfflineHost;
    use crate::playback::loader::{LoadRequest, LoadTicket};
    use petcalm_common::{Catalog, PlaybackStatus};

    struct NoLoader;

    impl AssetLoader for NoLoader {
        fn load(&self, _request: LoadRequest) -> LoadTicket {
            LoadTicket::detached()
        }
    }

    fn engine(host: &OfflineHost) -> AudioEngine {
        let config = EngineConfig {
            noise_loop_seconds: 0.25,
            ..EngineConfig::default()
        };
        AudioEngine::init_with_loader(Arc::new(host.clone()), Arc::new(NoLoader), &config)
    }

    fn sound(id: &str) -> SoundDescriptor {
        Catalog::builtin().get(id).cloned().unwrap()
    }

    #[tokio::test]
    async fn test_commands_reply_with_state() {
        let host = OfflineHost::new(8000);
        let engine = engine(&host);
        let handle = engine.handle();

        let state = handle.play_primary(sound("9")).await.unwrap();
        assert_eq!(state.primary.unwrap().status, PlaybackStatus::Playing);

        let state = handle.toggle_primary_pause().await.unwrap();
        assert_eq!(state.primary.unwrap().status, PlaybackStatus::Paused);

        let caps = handle.capabilities();
        assert!(caps.generation_supported);
        assert_eq!(caps.sample_rate, 8000);

        engine.teardown().await.unwrap();
        assert_eq!(host.open_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_errors_after_teardown() {
        let host = OfflineHost::new(8000);
        let engine = engine(&host);
        let handle = engine.handle();
        engine.teardown().await.unwrap();

        let err = handle.mix_state().await.unwrap_err();
        assert!(matches!(err, Error::EngineClosed));
    }

    #[tokio::test]
    async fn test_snapshots_follow_commands() {
        let host = OfflineHost::new(8000);
        let engine = engine(&host);
        let handle = engine.handle();
        let mut snapshots = handle.subscribe_snapshots();

        handle.play_primary(sound("3")).await.unwrap();
        snapshots.changed().await.unwrap();
        let snapshot = snapshots.borrow_and_update().clone();
        assert_eq!(snapshot.mix.primary.unwrap().descriptor.id, "3");

        engine.teardown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_timer_stops_mix_after_fifteen_minutes() {
        let host = OfflineHost::new(8000);
        let engine = engine(&host);
        let handle = engine.handle();

        handle.play_primary(sound("9")).await.unwrap();
        handle.toggle_secondary(sound("10")).await.unwrap();
        let timer = handle
            .set_sleep_timer(SleepTimerPreset::Minutes15)
            .await
            .unwrap();
        assert_eq!(timer.remaining_minutes, Some(15));

        tokio::time::sleep(Duration::from_secs(14 * 60 + 30)).await;
        let timer = handle.sleep_timer_state().await.unwrap();
        assert_eq!(timer.remaining_minutes, Some(1));
        assert_eq!(host.running_count(), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let state = handle.mix_state().await.unwrap();
        assert!(state.is_silent());
        assert_eq!(host.open_count(), 0);
        assert!(!handle.sleep_timer_state().await.unwrap().active);

        engine.teardown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_timer_off_cancels_countdown() {
        let host = OfflineHost::new(8000);
        let engine = engine(&host);
        let handle = engine.handle();

        handle.play_primary(sound("9")).await.unwrap();
        handle.set_sleep_timer(SleepTimerPreset::Minutes15).await.unwrap();
        handle.set_sleep_timer(SleepTimerPreset::Off).await.unwrap();

        tokio::time::sleep(Duration::from_secs(20 * 60)).await;
        let state = handle.mix_state().await.unwrap();
        assert_eq!(state.primary.unwrap().status, PlaybackStatus::Playing);

        engine.teardown().await.unwrap();
    }
}
