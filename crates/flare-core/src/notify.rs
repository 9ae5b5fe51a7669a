//! Best-effort broadcast of asset changes.
//!
//! Observers such as the UI subscribe to learn that an image was uploaded,
//! fetched on demand or deleted. Delivery is not guaranteed: a receiver that
//! falls behind skips the events it missed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::ResourceClass;

/// Tracing target for change notifications.
pub const TRACING_TARGET: &str = "flare_core::notify";

/// Default number of events buffered per receiver.
pub const DEFAULT_CAPACITY: usize = 256;

/// What happened to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetChange {
    /// The asset was written or replaced.
    Updated,
    /// The asset was deleted.
    Removed,
}

/// A change to a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEvent {
    /// Resource class of the asset.
    pub class: ResourceClass,
    /// Identifying key of the asset within its class.
    pub key: String,
    /// Kind of change.
    pub change: AssetChange,
}

impl AssetEvent {
    /// Creates an event for a written asset.
    pub fn updated(class: ResourceClass, key: impl Into<String>) -> Self {
        Self {
            class,
            key: key.into(),
            change: AssetChange::Updated,
        }
    }

    /// Creates an event for a deleted asset.
    pub fn removed(class: ResourceClass, key: impl Into<String>) -> Self {
        Self {
            class,
            key: key.into(),
            change: AssetChange::Removed,
        }
    }
}

/// Sender half of the asset change broadcast.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<AssetEvent>,
}

impl ChangeNotifier {
    /// Creates a notifier buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcasts an event and returns the number of observers reached.
    ///
    /// Having no observers is not an error.
    pub fn notify(&self, event: AssetEvent) -> usize {
        tracing::debug!(
            target: TRACING_TARGET,
            class = %event.class,
            key = %event.key,
            change = ?event.change,
            "Asset changed"
        );

        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribes to events broadcast after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AssetEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of connected observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
