//! The LedgerStore trait that backends implement.

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::UsageRecord;
use crate::StoreError;

/// Key-value persistence for daily usage, keyed by calendar date.
///
/// Every mutation is a single atomic operation in the backend, so several
/// ledgers (or processes) sharing one database never lose an update and never
/// lower a total. Mutations are durable before they return: the ledger is the
/// only record of elapsed time that has not reached the shared store.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get the record for a date, if any activity was recorded.
    async fn get_usage(&self, date: NaiveDate) -> Result<Option<UsageRecord>, StoreError>;

    /// Add `delta_seconds` to the total for `date`, creating the record at 0.
    async fn add_usage(&self, date: NaiveDate, delta_seconds: u64)
        -> Result<UsageRecord, StoreError>;

    /// Raise the total for `date` to `total_seconds`, creating the record.
    ///
    /// Returns `None` when the stored total was already at least that high.
    async fn raise_usage(
        &self,
        date: NaiveDate,
        total_seconds: u64,
    ) -> Result<Option<UsageRecord>, StoreError>;

    /// Replace the sync timestamp and raise the total to at least
    /// `total_seconds`.
    async fn set_usage(
        &self,
        date: NaiveDate,
        total_seconds: u64,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<UsageRecord, StoreError>;

    /// Raise `synced_seconds` and stamp the sync time. Never touches the
    /// total; a date without a record is left alone.
    async fn mark_synced(
        &self,
        date: NaiveDate,
        synced_seconds: u64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// List records with `from <= date <= to`, ascending by date.
    async fn list_usage(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<UsageRecord>, StoreError>;

    /// List records whose total has not been confirmed by the shared store,
    /// ascending by date.
    async fn list_pending(&self) -> Result<Vec<UsageRecord>, StoreError>;
}
