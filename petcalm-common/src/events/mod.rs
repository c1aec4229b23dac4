//! Engine notifications
//!
//! `AudioEvent` is what the engine and the offline cache report to observers
//! (a UI layer, tests); `EventBus` fans them out.

mod playback_types;

pub use playback_types::{FailureKind, MixSlot, PlaybackStatus};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// PetCalm audio events
///
/// Events are broadcast via EventBus and can be serialized for forwarding to
/// a UI process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AudioEvent {
    /// Session in a slot moved to a new status
    SessionStatusChanged {
        slot: MixSlot,
        sound_id: String,
        status: PlaybackStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session in a slot failed; the other slot is unaffected
    SessionFailed {
        slot: MixSlot,
        sound_id: String,
        kind: FailureKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Slot volume changed (clamped value)
    VolumeChanged {
        slot: MixSlot,
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A command was refused and left state unchanged
    CommandRejected {
        slot: MixSlot,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sleep timer set, cancelled or decremented
    SleepTimerChanged {
        /// None when the timer is off
        remaining_minutes: Option<u32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sleep timer reached zero (stop-all follows)
    SleepTimerElapsed {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Both slots were stopped
    AllStopped {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Offline cache populated for a version tag
    CacheInstalled {
        version: String,
        assets: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Obsolete caches removed after activation
    CacheActivated {
        version: String,
        deleted: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AudioEvent {
    /// Short event name, used in log lines
    pub fn event_type(&self) -> &'static str {
        match self {
            AudioEvent::SessionStatusChanged { .. } => "SessionStatusChanged",
            AudioEvent::SessionFailed { .. } => "SessionFailed",
            AudioEvent::VolumeChanged { .. } => "VolumeChanged",
            AudioEvent::CommandRejected { .. } => "CommandRejected",
            AudioEvent::SleepTimerChanged { .. } => "SleepTimerChanged",
            AudioEvent::SleepTimerElapsed { .. } => "SleepTimerElapsed",
            AudioEvent::AllStopped { .. } => "AllStopped",
            AudioEvent::CacheInstalled { .. } => "CacheInstalled",
            AudioEvent::CacheActivated { .. } => "CacheActivated",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lag and lose
/// the oldest events rather than blocking the engine loop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AudioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Bus holding up to `capacity` undelivered events per subscriber
    ///
    /// ```
    /// use petcalm_common::events::EventBus;
    ///
    /// let bus = EventBus::new(64);
    /// assert_eq!(bus.capacity(), 64);
    /// assert_eq!(bus.subscriber_count(), 0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// New receiver; sees only events sent after this call
    pub fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.tx.subscribe()
    }

    /// Send to every receiver, failing when there are none
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: AudioEvent) -> Result<usize, broadcast::error::SendError<AudioEvent>> {
        self.tx.send(event)
    }

    /// Send and drop the event silently when nobody listens
    pub fn emit_lossy(&self, event: AudioEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
