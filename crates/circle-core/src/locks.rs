use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per calendar date.
#[derive(Default)]
pub(crate) struct DateLocks {
    locks: DashMap<NaiveDate, Arc<Mutex<()>>>,
}

impl DateLocks {
    pub(crate) async fn acquire(&self, date: NaiveDate) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await
        let lock = self.locks.entry(date).or_default().clone();
        lock.lock_owned().await
    }
}
