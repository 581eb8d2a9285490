//! Bridges the OS usage-statistics facility into the ledger.

use async_trait::async_trait;
use chrono::{DateTime, Days, Local, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ActivityError, CollectError};
use crate::ledger::LocalLedger;

/// OS facility reporting device-active time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Total active seconds in `[start, end)`.
    async fn active_seconds_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, ActivityError>;
}

/// Pulls per-day totals from an [`ActivitySource`] and raises the ledger to
/// them.
pub struct UsageCollector {
    source: Arc<dyn ActivitySource>,
    ledger: Arc<LocalLedger>,
    catch_up_days: u32,
}

impl UsageCollector {
    pub fn new(source: Arc<dyn ActivitySource>, ledger: Arc<LocalLedger>) -> Self {
        Self {
            source,
            ledger,
            catch_up_days: 0,
        }
    }

    /// Also revisit this many days before today on each collection.
    pub fn with_catch_up_days(mut self, days: u32) -> Self {
        self.catch_up_days = days;
        self
    }

    /// Collect today (and catch-up days) up to `now`.
    ///
    /// Returns the dates whose ledger total grew.
    pub async fn collect(&self, now: DateTime<Local>) -> Result<Vec<NaiveDate>, CollectError> {
        let today = now.date_naive();
        let mut touched = Vec::new();

        for back in (0..=self.catch_up_days).rev() {
            let Some(date) = today.checked_sub_days(Days::new(u64::from(back))) else {
                continue;
            };
            let start = local_midnight(date);
            let end = if date == today {
                now.with_timezone(&Utc)
            } else {
                date.succ_opt().map(local_midnight).unwrap_or(start)
            };

            let os_total = self.source.active_seconds_between(start, end).await?;
            // Overlapping collections credit the same OS time once.
            match self.ledger.raise_to(date, os_total).await? {
                Some(record) => {
                    debug!(%date, os_total, total = record.total_seconds, "collected usage");
                    touched.push(date);
                }
                None => debug!(%date, os_total, "ledger already covers usage"),
            }
        }

        Ok(touched)
    }
}

/// Start of `date` in the local timezone, as UTC.
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
