//! Playback: producers, sessions, the two-slot mix bus and the engine loop

pub mod engine;
pub mod generator;
pub mod loader;
pub mod mix_bus;
pub mod session;
pub mod sleep_timer;
pub mod state;
pub mod streamed;

pub use engine::{AudioEngine, EngineHandle, SLEEP_TICK_PERIOD};
pub use generator::{GeneratorSettings, SignalGenerator};
pub use loader::{load_asset, AssetLoader, CacheLoader, LoadOutcome, LoadRequest, LoadTicket};
pub use mix_bus::MixBus;
pub use session::{PlaybackSession, SessionEnv};
pub use sleep_timer::{SleepTimer, SleepTimerPreset, TimerTick};
pub use state::{EngineSnapshot, MixState, PlaybackState, SleepTimerState};
pub use streamed::{StreamedSource, StreamedState};
