//! Asset loading for streamed sessions
//!
//! A session asks its `AssetLoader` for a file asset and keeps the returned
//! `LoadTicket`. Dropping the ticket abandons the load (the background task
//! is aborted). Completed loads are delivered back to the owner tagged with
//! the session token so stale results can be recognised and discarded.

use crate::audio::decode::decode_bytes;
use crate::audio::resampler::Resampler;
use crate::audio::types::PcmBuffer;
use crate::cache::OfflineAssetCache;
use crate::error::{Error, Result};
use petcalm_common::MixSlot;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// One asset load on behalf of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub slot: MixSlot,
    /// Session token of the selection that asked for the asset
    pub token: Uuid,
    pub sound_id: String,
    pub url: String,
    /// Rate the decoded asset must be resampled to
    pub target_rate: u32,
}

/// Outcome of a load, delivered back to the engine loop
#[derive(Debug)]
pub struct LoadOutcome {
    pub slot: MixSlot,
    pub token: Uuid,
    pub result: Result<PcmBuffer>,
}

/// Handle to an in-flight load; dropping it abandons the load
#[derive(Debug, Default)]
pub struct LoadTicket {
    abort: Option<AbortHandle>,
}

impl LoadTicket {
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// Ticket with no background task behind it
    pub fn detached() -> Self {
        Self { abort: None }
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

/// Starts asset loads for streamed sessions
pub trait AssetLoader: Send + Sync {
    fn load(&self, request: LoadRequest) -> LoadTicket;
}

/// Fetch bytes through the cache, then decode and resample off the runtime
pub async fn load_asset(
    cache: &OfflineAssetCache,
    url: &str,
    target_rate: u32,
) -> Result<PcmBuffer> {
    let bytes = cache.fetch(url).await?;
    let name = url.to_string();

    tokio::task::spawn_blocking(move || {
        let decoded = decode_bytes(bytes, &name)?;
        let samples = Resampler::resample(&decoded.samples, decoded.sample_rate, target_rate, 2)?;
        Ok(PcmBuffer::new(samples, target_rate))
    })
    .await
    .map_err(|e| Error::Decode(format!("{}: decode task failed: {}", url, e)))?
}

/// Loader used by the engine: spawns a task per request and posts the
/// outcome back on the engine's channel
pub struct CacheLoader<C> {
    cache: Arc<OfflineAssetCache>,
    outcomes: mpsc::WeakUnboundedSender<C>,
    wrap: fn(LoadOutcome) -> C,
}

impl<C: Send + 'static> CacheLoader<C> {
    pub fn new(
        cache: Arc<OfflineAssetCache>,
        outcomes: mpsc::WeakUnboundedSender<C>,
        wrap: fn(LoadOutcome) -> C,
    ) -> Self {
        Self {
            cache,
            outcomes,
            wrap,
        }
    }
}

impl<C: Send + 'static> AssetLoader for CacheLoader<C> {
    fn load(&self, request: LoadRequest) -> LoadTicket {
        let cache = Arc::clone(&self.cache);
        let outcomes = self.outcomes.clone();
        let wrap = self.wrap;

        debug!(
            "Loading {} for {} slot (token {})",
            request.url, request.slot, request.token
        );

        let handle = tokio::spawn(async move {
            let result = load_asset(&cache, &request.url, request.target_rate).await;
            if let Err(e) = &result {
                warn!("Load of {} failed: {}", request.url, e);
            }

            let outcome = LoadOutcome {
                slot: request.slot,
                token: request.token,
                result,
            };
            match outcomes.upgrade() {
                Some(tx) => {
                    let _ = tx.send(wrap(outcome));
                }
                None => debug!("Engine gone, dropping load of {}", request.url),
            }
        });

        LoadTicket::new(handle.abort_handle())
    }
}
