//! Daily usage records owned by the local ledger.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated active time for one calendar day (process-local timezone).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub date: NaiveDate,
    /// Never decreases.
    pub total_seconds: u64,
    /// Total last confirmed by the shared store.
    pub synced_seconds: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl UsageRecord {
    /// Empty record for a date with no recorded activity.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_seconds: 0,
            synced_seconds: 0,
            last_synced_at: None,
        }
    }

    /// Whether the local total is ahead of what the shared store has seen.
    pub fn is_pending(&self) -> bool {
        self.total_seconds > self.synced_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_empty_and_not_pending() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let record = UsageRecord::new(date);
        assert_eq!(record.total_seconds, 0);
        assert!(record.last_synced_at.is_none());
        assert!(!record.is_pending());
    }

    #[test]
    fn test_pending_tracks_unsynced_total() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut record = UsageRecord::new(date);
        record.total_seconds = 120;
        assert!(record.is_pending());
        record.synced_seconds = 120;
        assert!(!record.is_pending());
    }
}
