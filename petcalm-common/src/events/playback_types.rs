//! Playback-related type definitions
//!
//! Supporting types for session status, mix slots and failure reporting.

use serde::{Deserialize, Serialize};

/// Mix bus slot identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MixSlot {
    /// The main sound (generated or streamed)
    Primary,
    /// Optional overlay layered on top of the primary
    Secondary,
}

impl std::fmt::Display for MixSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MixSlot::Primary => write!(f, "primary"),
            MixSlot::Secondary => write!(f, "secondary"),
        }
    }
}

/// Playback session status
///
/// `Loading` only occurs for streamed sources (asset fetch + decode).
/// `Error` is terminal until the descriptor is selected again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

impl PlaybackStatus {
    /// Session holds (or is acquiring) a producer
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Loading | PlaybackStatus::Playing | PlaybackStatus::Paused
        )
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Loading => write!(f, "loading"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Error => write!(f, "error"),
        }
    }
}

/// Public failure taxonomy surfaced in playback state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Asset could not be fetched (offline and not cached, HTTP error, missing file)
    ResourceUnavailable,
    /// Asset bytes could not be decoded
    DecodeFailure,
    /// Platform cannot create a render context for synthesis
    GenerationUnsupported,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::ResourceUnavailable => write!(f, "resource unavailable"),
            FailureKind::DecodeFailure => write!(f, "decode failure"),
            FailureKind::GenerationUnsupported => write!(f, "generation unsupported"),
        }
    }
}
