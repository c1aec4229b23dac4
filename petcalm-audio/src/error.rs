//! Error types for petcalm-audio
//!
//! Defines module-specific error types using thiserror. Errors raised while
//! serving a session are mapped onto the public `FailureKind` taxonomy and
//! recorded in `PlaybackState`; they never cross the command boundary.

use petcalm_common::FailureKind;
use thiserror::Error;

/// Main error type for petcalm-audio
#[derive(Error, Debug)]
pub enum Error {
    /// Asset could not be fetched from cache, bundle or network
    #[error("Resource unavailable: {url}: {reason}")]
    ResourceUnavailable { url: String, reason: String },

    /// Audio decoding errors (corrupt or unsupported encoding)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Synthesis is not available on this platform
    #[error("Signal generation unsupported: {0}")]
    GenerationUnsupported(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Offline cache storage errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from petcalm-common
    #[error(transparent)]
    Common(#[from] petcalm_common::Error),

    /// Engine loop has shut down
    #[error("Audio engine is not running")]
    EngineClosed,
}

impl Error {
    /// Public failure taxonomy for this error
    ///
    /// Anything that is neither a decode nor a synthesis failure is reported
    /// as the resource being unavailable: the user's remedy is the same
    /// (retry by re-selecting the sound).
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Decode(_) => FailureKind::DecodeFailure,
            Error::GenerationUnsupported(_) => FailureKind::GenerationUnsupported,
            _ => FailureKind::ResourceUnavailable,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ResourceUnavailable {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convenience Result type using petcalm-audio Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            Error::Decode("bad header".into()).failure_kind(),
            FailureKind::DecodeFailure
        );
        assert_eq!(
            Error::GenerationUnsupported("no context".into()).failure_kind(),
            FailureKind::GenerationUnsupported
        );
        assert_eq!(
            Error::ResourceUnavailable {
                url: "/sounds/gentle-rain.mp3".into(),
                reason: "offline".into()
            }
            .failure_kind(),
            FailureKind::ResourceUnavailable
        );
        assert_eq!(
            Error::Cache("disk full".into()).failure_kind(),
            FailureKind::ResourceUnavailable
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::ResourceUnavailable {
            url: "/sounds/creek-water.mp3".into(),
            reason: "HTTP 404".into(),
        };
        assert_eq!(
            err.to_string(),
            "Resource unavailable: /sounds/creek-water.mp3: HTTP 404"
        );
    }
}
