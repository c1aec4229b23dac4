//! Scripted in-memory network

use async_trait::async_trait;
use petcalm_audio::cache::{FetchedAsset, Network};
use petcalm_audio::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Serves registered paths; counts every call, including failed ones
#[derive(Clone, Default)]
pub struct MockNetwork {
    assets: Arc<Mutex<HashMap<String, FetchedAsset>>>,
    offline: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, bytes: Vec<u8>, content_type: &str) {
        self.assets.lock().unwrap().insert(
            path.to_string(),
            FetchedAsset {
                bytes,
                content_type: Some(content_type.to_string()),
            },
        );
    }

    pub fn remove(&self, path: &str) {
        self.assets.lock().unwrap().remove(path);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, path: &str) -> Result<FetchedAsset> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::ResourceUnavailable {
                url: path.to_string(),
                reason: "network offline".to_string(),
            });
        }

        self.assets
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::ResourceUnavailable {
                url: path.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}
