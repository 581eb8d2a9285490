//! In-process subscriber bookkeeping shared by store implementations.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{ChangeEvent, ChangeStream, StorePath};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast channels keyed by subscribed path.
///
/// Subscribers only see changes published within this process.
#[derive(Default)]
pub struct SubscriberRegistry {
    channels: DashMap<StorePath, broadcast::Sender<ChangeEvent>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes overlapping `path`.
    pub fn subscribe(&self, path: &StorePath) -> ChangeStream {
        let rx = self
            .channels
            .entry(path.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        // Lagged receivers skip ahead; consumers re-read state on every event
        // so the newest retained event is enough to converge.
        let stream = BroadcastStream::new(rx).filter_map(|result| result.ok());
        Box::pin(stream)
    }

    /// Deliver a change at `changed` to every overlapping subscription.
    pub fn notify(&self, changed: &StorePath, value: Option<&Value>) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);

        for entry in self.channels.iter() {
            if entry.key().overlaps(changed) {
                // Ignore error if the last receiver went away meanwhile
                let _ = entry.value().send(ChangeEvent {
                    path: changed.clone(),
                    value: value.cloned(),
                });
            }
        }
    }

    /// Number of paths with at least one live subscriber.
    pub fn active_paths(&self) -> usize {
        self.channels
            .iter()
            .filter(|entry| entry.value().receiver_count() > 0)
            .count()
    }
}
