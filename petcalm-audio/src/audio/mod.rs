//! Audio processing: synthesis, decoding, resampling and output hosts

pub mod decode;
pub mod gain;
pub mod offline;
pub mod output;
pub mod resampler;
pub mod synth;
pub mod types;

pub use decode::{decode_bytes, DecodedAudio};
pub use gain::{clamp_volume, GainHandle, GainRamp};
pub use offline::{LifecycleEvent, LifecycleKind, OfflineHost};
#[cfg(feature = "device-output")]
pub use output::CpalHost;
pub use output::{AudioHost, RenderContext, RenderFn};
pub use resampler::Resampler;
pub use synth::{BinauralPreset, NoiseParams, Signal};
pub use types::{AudioFrame, PcmBuffer};
