//! Test helper modules for petcalm-audio integration tests
//!
//! - audio_generator: in-memory WAV assets via hound
//! - mock_network: scripted `Network` that counts calls and can go offline

#![allow(dead_code)]

pub mod audio_generator;
pub mod mock_network;

pub use audio_generator::{sine_wav_bytes, TEST_SAMPLE_RATE};
pub use mock_network::MockNetwork;

use petcalm_audio::config::CacheConfig;
use petcalm_common::{Catalog, SoundDescriptor};

/// Descriptor from the built-in catalog
pub fn sound(id: &str) -> SoundDescriptor {
    Catalog::builtin()
        .get(id)
        .cloned()
        .unwrap_or_else(|| panic!("no built-in sound with id {}", id))
}

/// Cache config whose manifest is the app shell plus the bundled nature sounds
pub fn cache_config(version: &str) -> CacheConfig {
    CacheConfig {
        version: version.to_string(),
        ..CacheConfig::default()
    }
}

/// Bundled nature sounds as (path, WAV bytes); each a distinct tone
pub fn bundled_audio() -> Vec<(String, Vec<u8>)> {
    Catalog::builtin()
        .asset_urls()
        .into_iter()
        .enumerate()
        .map(|(i, path)| (path, sine_wav_bytes(250, 220.0 + 110.0 * i as f32, 0.5)))
        .collect()
}

/// Network serving every default manifest entry
pub fn bundled_network() -> MockNetwork {
    let network = MockNetwork::new();
    network.insert("/", b"<html>shell</html>".to_vec(), "text/html");
    network.insert("/index.html", b"<html>shell</html>".to_vec(), "text/html");
    for (path, bytes) in bundled_audio() {
        network.insert(&path, bytes, "audio/wav");
    }
    network
}
