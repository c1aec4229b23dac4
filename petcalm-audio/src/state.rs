//! Shared engine state
//!
//! Observation side of the engine: the event bus and the latest snapshot.
//! The engine loop is the only writer; handles hold an `Arc` for reads and
//! subscriptions.

use crate::playback::state::EngineSnapshot;
use petcalm_common::{AudioEvent, EventBus};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

/// What the current audio host can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Procedural synthesis is available (generated sounds are playable)
    pub generation_supported: bool,
    /// Output sample rate assets are resampled to
    pub sample_rate: u32,
}

pub struct SharedState {
    pub capabilities: Capabilities,

    /// Event broadcaster for subscribers
    pub events: EventBus,

    /// Latest snapshot; receivers are notified on every change
    snapshot_tx: watch::Sender<EngineSnapshot>,
}

impl SharedState {
    pub fn new(capabilities: Capabilities, event_capacity: usize) -> Self {
        Self::with_events(capabilities, EventBus::new(event_capacity))
    }

    /// Publish on an existing bus, e.g. the one the offline cache reports on
    pub fn with_events(capabilities: Capabilities, events: EventBus) -> Self {
        let (snapshot_tx, _) = watch::channel(EngineSnapshot::default());
        Self {
            capabilities,
            events,
            snapshot_tx,
        }
    }

    /// Replace the snapshot, notifying watchers only when it changed
    pub fn publish(&self, snapshot: EngineSnapshot) {
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AudioEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::state::SleepTimerState;

    fn capabilities() -> Capabilities {
        Capabilities {
            generation_supported: true,
            sample_rate: 44100,
        }
    }

    #[test]
    fn test_publish_notifies_on_change_only() {
        let state = SharedState::new(capabilities(), 16);
        let mut rx = state.subscribe_snapshots();

        state.publish(EngineSnapshot::default());
        assert!(!rx.has_changed().unwrap());

        let snapshot = EngineSnapshot {
            sleep_timer: SleepTimerState {
                remaining_minutes: Some(15),
                active: true,
            },
            ..EngineSnapshot::default()
        };
        state.publish(snapshot.clone());
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), snapshot);
        assert_eq!(state.snapshot(), snapshot);
    }

    #[test]
    fn test_event_capacity_is_applied() {
        let state = SharedState::new(capabilities(), 8);
        assert_eq!(state.events.capacity(), 8);
        let _rx = state.subscribe_events();
        assert_eq!(state.events.subscriber_count(), 1);
    }
}
