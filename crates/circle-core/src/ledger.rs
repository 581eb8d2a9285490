//! Durable per-date accumulator of active seconds.

use chrono::{DateTime, NaiveDate, Utc};
use circle_storage::{LedgerStore, UsageRecord};
use std::sync::Arc;
use tracing::debug;

use crate::error::StorageError;
use crate::summary::WeeklySummary;

/// Single source of truth for the signed-in user's own daily totals.
///
/// Each write is one atomic store operation, so concurrent writers (in this
/// process or in another one sharing the database) never lose an update and
/// never lower a total.
pub struct LocalLedger {
    store: Arc<dyn LedgerStore>,
}

impl LocalLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Add `delta_seconds` to the total for `date`, creating it at 0.
    ///
    /// Returns the updated record once it is durable.
    pub async fn accumulate(
        &self,
        date: NaiveDate,
        delta_seconds: u64,
    ) -> Result<UsageRecord, StorageError> {
        let record = self.store.add_usage(date, delta_seconds).await?;
        debug!(%date, delta_seconds, total = record.total_seconds, "accumulated usage");
        Ok(record)
    }

    /// Raise the total for `date` to `total_seconds` if it is below it.
    ///
    /// Returns the updated record, or `None` when nothing changed. Callers
    /// racing with the same observed total credit it once between them.
    pub async fn raise_to(
        &self,
        date: NaiveDate,
        total_seconds: u64,
    ) -> Result<Option<UsageRecord>, StorageError> {
        if total_seconds == 0 {
            return Ok(None);
        }
        Ok(self.store.raise_usage(date, total_seconds).await?)
    }

    pub async fn get(&self, date: NaiveDate) -> Result<Option<UsageRecord>, StorageError> {
        Ok(self.store.get_usage(date).await?)
    }

    /// Overwrite the total and sync timestamp for `date`.
    ///
    /// The stored total never decreases: a smaller `total_seconds` keeps the
    /// current total and only updates the timestamp.
    pub async fn set(
        &self,
        date: NaiveDate,
        total_seconds: u64,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<UsageRecord, StorageError> {
        Ok(self
            .store
            .set_usage(date, total_seconds, last_synced_at)
            .await?)
    }

    /// Record that the shared store holds `synced_seconds` for `date`.
    ///
    /// Leaves the total alone, so time accumulated while a push was in flight
    /// stays pending.
    pub async fn mark_synced(
        &self,
        date: NaiveDate,
        synced_seconds: u64,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        Ok(self.store.mark_synced(date, synced_seconds, at).await?)
    }

    /// Records whose total the shared store has not confirmed yet.
    pub async fn pending(&self) -> Result<Vec<UsageRecord>, StorageError> {
        Ok(self.store.list_pending().await?)
    }

    pub async fn weekly_summary(&self, today: NaiveDate) -> Result<WeeklySummary, StorageError> {
        let records = self
            .store
            .list_usage(WeeklySummary::window_start(today), today)
            .await?;
        Ok(WeeklySummary::from_records(today, &records))
    }
}
