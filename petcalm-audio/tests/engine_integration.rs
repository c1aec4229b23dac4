//! End-to-end engine tests: real asset loads through the offline cache
//! (WAV decode + resample) on an offline host

mod helpers;

use helpers::{bundled_network, cache_config, sound, MockNetwork};
use petcalm_audio::audio::OfflineHost;
use petcalm_audio::cache::{CacheStorage, OfflineAssetCache};
use petcalm_audio::config::EngineConfig;
use petcalm_audio::playback::EngineSnapshot;
use petcalm_audio::{AudioEngine, SleepTimerPreset};
use petcalm_common::{AudioEvent, EventBus, FailureKind, MixSlot, PlaybackStatus};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

const ENGINE_RATE: u32 = 44100;

async fn installed_cache(dir: &TempDir, network: &MockNetwork) -> Arc<OfflineAssetCache> {
    let cache = OfflineAssetCache::new(
        CacheStorage::new(dir.path()),
        Arc::new(network.clone()),
        cache_config("petcalm-audio-cache-v2"),
        EventBus::new(64),
    );
    cache.install().await.unwrap();
    Arc::new(cache)
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        preferred_sample_rate: ENGINE_RATE,
        noise_loop_seconds: 0.5,
        ..EngineConfig::default()
    }
}

async fn wait_for_status(
    snapshots: &mut watch::Receiver<EngineSnapshot>,
    slot: MixSlot,
    status: PlaybackStatus,
) {
    snapshots
        .wait_for(|s| {
            let state = match slot {
                MixSlot::Primary => &s.mix.primary,
                MixSlot::Secondary => &s.mix.secondary,
            };
            state.as_ref().map_or(false, |p| p.status == status)
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn streamed_asset_plays_offline_from_cache() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    let cache = installed_cache(&dir, &network).await;
    network.set_offline(true);
    network.reset_calls();

    let host = OfflineHost::new(ENGINE_RATE);
    let engine = AudioEngine::init(Arc::new(host.clone()), cache, &engine_config());
    let handle = engine.handle();
    let mut snapshots = handle.subscribe_snapshots();

    let state = handle.play_primary(sound("7")).await.unwrap();
    assert_eq!(state.primary.unwrap().status, PlaybackStatus::Loading);

    wait_for_status(&mut snapshots, MixSlot::Primary, PlaybackStatus::Playing).await;
    assert_eq!(network.calls(), 0);
    assert_eq!(host.running_labels(), vec!["primary:7".to_string()]);

    let frames = host.render(ENGINE_RATE as usize / 10);
    let peak = frames.iter().map(|f| f.left.abs()).fold(0.0f32, f32::max);
    assert!(peak > 0.05, "peak {}", peak);
    assert!(peak <= 1.0);

    let state = handle.set_primary_speed(0.25).await.unwrap();
    assert_eq!(state.primary.unwrap().speed, 0.5);

    engine.teardown().await.unwrap();
    assert_eq!(host.open_count(), 0);
}

#[tokio::test]
async fn uncached_asset_offline_reports_resource_unavailable() {
    let dir = TempDir::new().unwrap();
    let network = MockNetwork::new();
    network.set_offline(true);
    let cache = Arc::new(OfflineAssetCache::new(
        CacheStorage::new(dir.path()),
        Arc::new(network.clone()),
        cache_config("v1"),
        EventBus::new(64),
    ));

    let host = OfflineHost::new(ENGINE_RATE);
    let engine = AudioEngine::init(Arc::new(host.clone()), cache, &engine_config());
    let handle = engine.handle();
    let mut snapshots = handle.subscribe_snapshots();
    let mut events = handle.subscribe_events();

    handle.play_primary(sound("4")).await.unwrap();
    wait_for_status(&mut snapshots, MixSlot::Primary, PlaybackStatus::Error).await;

    let state = handle.mix_state().await.unwrap();
    assert_eq!(
        state.primary.unwrap().error_kind,
        Some(FailureKind::ResourceUnavailable)
    );
    assert_eq!(host.open_count(), 0);

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        failed |= event.event_type() == "SessionFailed";
    }
    assert!(failed);

    engine.teardown().await.unwrap();
}

#[tokio::test]
async fn corrupt_asset_reports_decode_failure() {
    let dir = TempDir::new().unwrap();
    let network = MockNetwork::new();
    network.insert("/sounds/ocean-waves.mp3", vec![0x13; 4096], "audio/mpeg");
    let cache = Arc::new(OfflineAssetCache::new(
        CacheStorage::new(dir.path()),
        Arc::new(network.clone()),
        cache_config("v1"),
        EventBus::new(64),
    ));

    let host = OfflineHost::new(ENGINE_RATE);
    let engine = AudioEngine::init(Arc::new(host.clone()), cache, &engine_config());
    let handle = engine.handle();
    let mut snapshots = handle.subscribe_snapshots();

    handle.play_primary(sound("7")).await.unwrap();
    wait_for_status(&mut snapshots, MixSlot::Primary, PlaybackStatus::Error).await;

    let state = handle.mix_state().await.unwrap();
    assert_eq!(state.primary.unwrap().error_kind, Some(FailureKind::DecodeFailure));

    engine.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn white_noise_and_rain_stop_after_fifteen_minutes() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    let cache = installed_cache(&dir, &network).await;
    network.set_offline(true);

    let host = OfflineHost::new(ENGINE_RATE);
    let engine = AudioEngine::init(Arc::new(host.clone()), cache, &engine_config());
    let handle = engine.handle();
    let mut snapshots = handle.subscribe_snapshots();

    let state = handle.play_primary(sound("9")).await.unwrap();
    assert!(state.primary.unwrap().is_playing());
    handle.toggle_secondary(sound("1")).await.unwrap();
    wait_for_status(&mut snapshots, MixSlot::Secondary, PlaybackStatus::Playing).await;

    let timer = handle
        .set_sleep_timer(SleepTimerPreset::Minutes15)
        .await
        .unwrap();
    assert_eq!(timer.remaining_minutes, Some(15));

    tokio::time::sleep(Duration::from_secs(14 * 60 + 30)).await;
    assert_eq!(
        handle.sleep_timer_state().await.unwrap().remaining_minutes,
        Some(1)
    );
    assert_eq!(host.running_count(), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let state = handle.mix_state().await.unwrap();
    assert!(state.is_silent());
    assert_eq!(state.primary.unwrap().status, PlaybackStatus::Idle);
    assert_eq!(state.secondary.unwrap().status, PlaybackStatus::Idle);
    assert_eq!(host.open_count(), 0);
    assert!(!handle.sleep_timer_state().await.unwrap().active);
    assert!(handle.snapshot().mix.is_silent());

    engine.teardown().await.unwrap();
}

#[tokio::test]
async fn cache_events_reach_engine_subscribers() {
    let dir = TempDir::new().unwrap();
    let network = bundled_network();
    let cache = Arc::new(OfflineAssetCache::new(
        CacheStorage::new(dir.path()),
        Arc::new(network.clone()),
        cache_config("petcalm-audio-cache-v2"),
        EventBus::new(64),
    ));

    let host = OfflineHost::new(ENGINE_RATE);
    let engine = AudioEngine::init(Arc::new(host), Arc::clone(&cache), &engine_config());
    let mut events = engine.handle().subscribe_events();

    cache.install().await.unwrap();
    cache.activate().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen
        .iter()
        .any(|e| matches!(e, AudioEvent::CacheInstalled { assets: 6, .. })));
    assert!(seen
        .iter()
        .any(|e| matches!(e, AudioEvent::CacheActivated { .. })));

    engine.teardown().await.unwrap();
}
