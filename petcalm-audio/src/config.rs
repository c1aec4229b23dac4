//! Configuration for the PetCalm audio engine
//!
//! A single TOML file with optional sections; every field has a built-in
//! default so an absent file means "defaults everywhere".
//!
//! # Settings Sources Priority
//!
//! 1. Explicit path from the embedding application
//! 2. `PETCALM_CONFIG` environment variable
//! 3. `~/.config/petcalm/config.toml`
//! 4. Built-in defaults (code constants)
//!
//! ```toml
//! root_folder = "/var/lib/petcalm"
//!
//! [engine]
//! noise_loop_seconds = 4.0
//! brown_gain = 3.5
//! binaural_preset = "alpha"
//!
//! [cache]
//! version = "petcalm-audio-cache-v2"
//! base_url = "https://petcalm.app"
//!
//! [logging]
//! level = "debug"
//! ```

use crate::audio::synth::{BinauralPreset, NoiseParams, DEFAULT_BROWN_GAIN, DEFAULT_NOISE_LOOP_SECONDS};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TomlConfig {
    /// Storage root for the offline cache (optional)
    ///
    /// If not specified: explicit argument → environment → OS default
    pub root_folder: Option<PathBuf>,

    pub engine: EngineConfig,

    pub cache: CacheConfig,

    pub logging: LoggingConfig,
}

/// Engine and synthesis tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate requested from the output device
    pub preferred_sample_rate: u32,

    /// Length of the precomputed noise loop
    pub noise_loop_seconds: f32,

    /// Makeup gain applied to brown noise
    pub brown_gain: f32,

    /// Length of the linear volume ramp
    pub volume_ramp_ms: u32,

    pub default_primary_volume: f32,

    pub default_secondary_volume: f32,

    /// Broadcast channel capacity for engine events
    pub event_capacity: usize,

    /// Preset used by the binaural generator
    pub binaural_preset: BinauralPreset,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preferred_sample_rate: 44100,
            noise_loop_seconds: DEFAULT_NOISE_LOOP_SECONDS,
            brown_gain: DEFAULT_BROWN_GAIN,
            volume_ramp_ms: 30,
            default_primary_volume: 0.8,
            default_secondary_volume: 0.5,
            event_capacity: 256,
            binaural_preset: BinauralPreset::Theta,
        }
    }
}

impl EngineConfig {
    pub fn noise_params(&self) -> NoiseParams {
        NoiseParams {
            loop_seconds: self.noise_loop_seconds,
            brown_gain: self.brown_gain,
        }
    }
}

/// Offline asset cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache name; bump whenever the manifest changes
    pub version: String,

    /// Application shell served to offline navigations
    pub shell_path: String,

    /// Assets pre-populated at install time
    pub manifest: Vec<String>,

    /// Host name fragments whose requests are treated as audio
    pub audio_hosts: Vec<String>,

    /// Origin for HTTP fetches of relative paths (optional)
    pub base_url: Option<String>,

    /// Local bundle directory used instead of HTTP (optional)
    pub bundle_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: "petcalm-audio-cache-v2".to_string(),
            shell_path: "/index.html".to_string(),
            manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/sounds/gentle-rain.mp3".to_string(),
                "/sounds/forest-birds.mp3".to_string(),
                "/sounds/ocean-waves.mp3".to_string(),
                "/sounds/creek-water.mp3".to_string(),
            ],
            audio_hosts: vec!["pixabay".to_string()],
            base_url: None,
            bundle_dir: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Locate and load the config file, falling back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match petcalm_common::config::locate_config_file(explicit)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&content)
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.preferred_sample_rate == 0 {
            return Err(Error::Config("preferred_sample_rate must be > 0".to_string()));
        }
        if !(engine.noise_loop_seconds > 0.0 && engine.noise_loop_seconds <= 60.0) {
            return Err(Error::Config(format!(
                "noise_loop_seconds must be in (0, 60], got {}",
                engine.noise_loop_seconds
            )));
        }
        if !engine.brown_gain.is_finite() || engine.brown_gain <= 0.0 {
            return Err(Error::Config(format!(
                "brown_gain must be positive, got {}",
                engine.brown_gain
            )));
        }
        for (name, volume) in [
            ("default_primary_volume", engine.default_primary_volume),
            ("default_secondary_volume", engine.default_secondary_volume),
        ] {
            if !(0.0..=1.0).contains(&volume) {
                return Err(Error::Config(format!("{} must be in [0, 1], got {}", name, volume)));
            }
        }
        if engine.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be > 0".to_string()));
        }
        if self.cache.version.trim().is_empty() {
            return Err(Error::Config("cache.version must not be empty".to_string()));
        }
        Ok(())
    }

    /// Install the tracing subscriber at the configured level
    ///
    /// `RUST_LOG` still takes precedence when set.
    pub fn init_logging(&self) {
        petcalm_common::logging::init_tracing(&self.logging.level);
    }

    /// Resolve the storage root (explicit → env → TOML → OS default)
    pub fn storage_root(&self, explicit: Option<&Path>) -> PathBuf {
        petcalm_common::config::resolve_root_folder(explicit, self.root_folder.as_deref())
    }
}
