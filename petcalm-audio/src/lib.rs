//! # PetCalm Audio Engine (petcalm-audio)
//!
//! Ambient sound therapy engine: procedural noise and tone synthesis,
//! looping playback of bundled assets, a two-slot mix with a sleep timer,
//! and an offline asset cache so sounds keep working without a network.
//!
//! **Architecture:** one tokio task owns the mix (`playback::engine`);
//! callers drive it through an `EngineHandle`. Audio reaches the platform
//! through an `AudioHost` (cpal device output behind the `device-output`
//! feature, or the on-demand `OfflineHost`). Assets are decoded with
//! symphonia and resampled with rubato.

pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use playback::{AudioEngine, EngineHandle, MixState, PlaybackState, SleepTimerPreset, SleepTimerState};
pub use state::{Capabilities, SharedState};
