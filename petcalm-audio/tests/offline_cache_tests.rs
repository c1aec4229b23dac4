//! Offline asset cache integration tests
//!
//! Install/activate lifecycle and per-request-kind serving against a
//! scripted network and a temporary storage root.

mod helpers;

use helpers::{bundled_audio, bundled_network, cache_config, sine_wav_bytes, MockNetwork};
use petcalm_audio::cache::{CacheStorage, OfflineAssetCache};
use petcalm_audio::Error;
use petcalm_common::{AudioEvent, EventBus};
use std::sync::Arc;
use tempfile::TempDir;

fn cache(dir: &TempDir, network: &MockNetwork, version: &str) -> OfflineAssetCache {
    OfflineAssetCache::new(
        CacheStorage::new(dir.path()),
        Arc::new(network.clone()),
        cache_config(version),
        EventBus::new(16),
    )
}

#[tokio::test]
async fn test_installed_assets_served_offline_byte_identical() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    let cache = cache(&dir, &network, "petcalm-audio-cache-v2");

    let installed = cache.install().await.unwrap();
    assert_eq!(installed, 6);

    let originals = bundled_audio();

    network.set_offline(true);
    network.reset_calls();

    for (url, original) in &originals {
        let served = cache.fetch(url).await.unwrap();
        assert_eq!(&served, original, "{} differs", url);
    }
    assert_eq!(network.calls(), 0);
}

#[tokio::test]
async fn test_audio_cached_on_first_play() {
    let dir = TempDir::new().unwrap();
    let network = MockNetwork::new();
    let body = sine_wav_bytes(100, 440.0, 0.5);
    network.insert("/sounds/extra.ogg", body.clone(), "audio/ogg");
    let cache = cache(&dir, &network, "v1");

    assert_eq!(cache.fetch("/sounds/extra.ogg").await.unwrap(), body);
    assert_eq!(network.calls(), 1);

    network.set_offline(true);
    assert_eq!(cache.fetch("/sounds/extra.ogg").await.unwrap(), body);
    assert_eq!(network.calls(), 1);
}

#[tokio::test]
async fn test_uncached_audio_offline_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let network = MockNetwork::new();
    network.set_offline(true);
    let cache = cache(&dir, &network, "v1");

    let err = cache.fetch("/sounds/gentle-rain.mp3").await.unwrap_err();
    assert!(matches!(err, Error::ResourceUnavailable { .. }));
}

#[tokio::test]
async fn test_install_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    network.remove("/sounds/creek-water.mp3");
    let cache = cache(&dir, &network, "v3");

    let err = cache.install().await.unwrap_err();
    assert!(matches!(err, Error::ResourceUnavailable { .. }));
    assert!(!cache.storage().has_cache("v3").await);
}

#[tokio::test]
async fn test_failed_reinstall_keeps_installed_version() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    let cache = cache(&dir, &network, "petcalm-audio-cache-v2");
    cache.install().await.unwrap();

    network.set_offline(true);
    let err = cache.install().await.unwrap_err();
    assert!(matches!(err, Error::ResourceUnavailable { .. }));

    network.reset_calls();
    for (url, original) in &bundled_audio() {
        let served = cache.fetch(url).await.unwrap();
        assert_eq!(&served, original, "{} differs", url);
    }
    assert_eq!(network.calls(), 0);
    assert_eq!(
        cache.storage().list_names().await.unwrap(),
        vec!["petcalm-audio-cache-v2".to_string()]
    );
}

#[tokio::test]
async fn test_reinstall_refreshes_installed_version() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    let cache = cache(&dir, &network, "v1");
    cache.install().await.unwrap();

    network.insert("/index.html", b"<html>v1.1</html>".to_vec(), "text/html");
    assert_eq!(cache.install().await.unwrap(), 6);

    network.set_offline(true);
    assert_eq!(cache.fetch_navigation("/").await.unwrap(), b"<html>v1.1</html>");
}

#[tokio::test]
async fn test_activate_deletes_other_versions() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();

    cache(&dir, &network, "petcalm-audio-cache-v1")
        .install()
        .await
        .unwrap();
    let current = cache(&dir, &network, "petcalm-audio-cache-v2");
    current.install().await.unwrap();
    let mut events = current.subscribe_events();

    let deleted = current.activate().await.unwrap();
    assert_eq!(deleted, vec!["petcalm-audio-cache-v1".to_string()]);
    assert_eq!(
        current.storage().list_names().await.unwrap(),
        vec!["petcalm-audio-cache-v2".to_string()]
    );

    match events.recv().await.unwrap() {
        AudioEvent::CacheActivated { version, deleted, .. } => {
            assert_eq!(version, "petcalm-audio-cache-v2");
            assert_eq!(deleted.len(), 1);
        }
        other => panic!("unexpected event {:?}", other),
    }

    // Nothing left to delete the second time
    assert!(current.activate().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_navigation_falls_back_to_shell_offline() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    network.insert("/pets", b"<html>pets</html>".to_vec(), "text/html");
    let cache = cache(&dir, &network, "v1");
    cache.install().await.unwrap();

    assert_eq!(cache.fetch_navigation("/pets").await.unwrap(), b"<html>pets</html>");

    network.set_offline(true);
    assert_eq!(
        cache.fetch_navigation("/pets").await.unwrap(),
        b"<html>shell</html>"
    );
}

#[tokio::test]
async fn test_navigation_without_shell_reports_network_error() {
    let dir = TempDir::new().unwrap();
    let network = MockNetwork::new();
    network.set_offline(true);
    let cache = cache(&dir, &network, "v1");

    assert!(cache.fetch_navigation("/").await.is_err());
}

#[tokio::test]
async fn test_static_assets_are_stale_while_revalidate() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    let cache = cache(&dir, &network, "v1");
    cache.install().await.unwrap();

    network.insert("/index.html", b"<html>new</html>".to_vec(), "text/html");

    // Cached copy first, refreshed in the background
    assert_eq!(cache.fetch("/index.html").await.unwrap(), b"<html>shell</html>");
    cache.settle().await;
    assert_eq!(cache.fetch("/index.html").await.unwrap(), b"<html>new</html>");
    cache.settle().await;

    // Offline: cached copy still served, failed refresh is harmless
    network.set_offline(true);
    assert_eq!(cache.fetch("/index.html").await.unwrap(), b"<html>new</html>");
    cache.settle().await;
}
