//! Observable playback state
//!
//! Plain snapshots handed to callers after every command; the engine loop
//! is the only writer.

use petcalm_common::{FailureKind, PlaybackStatus, SoundDescriptor};
use serde::Serialize;

/// Default playback rate for streamed sources
pub const DEFAULT_SPEED: f32 = 1.0;

/// Allowed playback rate range for streamed sources
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

/// Clamp a requested speed into the supported range (NaN means default)
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        DEFAULT_SPEED
    } else {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

/// State of one occupied mix slot
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlaybackState {
    pub descriptor: SoundDescriptor,
    pub status: PlaybackStatus,
    /// Slot volume in `[0, 1]`
    pub volume: f32,
    /// Playback rate; generated sources always report 1.0
    pub speed: f32,
    pub error_message: Option<String>,
    pub error_kind: Option<FailureKind>,
}

impl PlaybackState {
    /// True only while audio is actually being produced
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn sound_id(&self) -> &str {
        &self.descriptor.id
    }
}

/// Both mix slots
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MixState {
    pub primary: Option<PlaybackState>,
    pub secondary: Option<PlaybackState>,
}

impl MixState {
    /// No slot is producing audio
    pub fn is_silent(&self) -> bool {
        !self.primary.as_ref().map_or(false, PlaybackState::is_playing)
            && !self.secondary.as_ref().map_or(false, PlaybackState::is_playing)
    }
}

/// Sleep timer countdown
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SleepTimerState {
    pub remaining_minutes: Option<u32>,
    pub active: bool,
}

/// Combined snapshot published on the watch channel
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct EngineSnapshot {
    pub mix: MixState,
    pub sleep_timer: SleepTimerState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_speed() {
        assert_eq!(clamp_speed(0.1), MIN_SPEED);
        assert_eq!(clamp_speed(3.0), MAX_SPEED);
        assert_eq!(clamp_speed(1.25), 1.25);
        assert_eq!(clamp_speed(f32::NAN), DEFAULT_SPEED);
    }

    #[test]
    fn test_empty_mix_is_silent() {
        assert!(MixState::default().is_silent());
        assert_eq!(SleepTimerState::default().remaining_minutes, None);
        assert!(!SleepTimerState::default().active);
    }
}
