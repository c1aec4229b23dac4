//! # PetCalm Common Library
//!
//! Shared code for the PetCalm audio engine and its embedding application:
//! - Sound catalog model (SoundDescriptor, SoundSource, GeneratorKind)
//! - Event types (AudioEvent enum) and the broadcast EventBus
//! - Configuration file and root folder resolution
//! - Tracing initialisation

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use catalog::{Catalog, GeneratorKind, SoundCategory, SoundDescriptor, SoundSource};
pub use error::{Error, Result};
pub use events::{AudioEvent, EventBus, FailureKind, MixSlot, PlaybackStatus};
