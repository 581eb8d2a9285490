//! Seven-day usage summary.

use chrono::{Days, NaiveDate};
use circle_storage::UsageRecord;
use serde::Serialize;

pub const SUMMARY_DAYS: u64 = 7;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub seconds: u64,
}

/// Last seven days ending today, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WeeklySummary {
    pub days: Vec<DailyTotal>,
    pub total_seconds: u64,
    /// Mean over days that recorded any activity (0 when none did).
    pub average_seconds: u64,
}

impl WeeklySummary {
    /// First day of the window ending at `today`.
    pub fn window_start(today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(SUMMARY_DAYS - 1))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn from_records(today: NaiveDate, records: &[UsageRecord]) -> Self {
        let start = Self::window_start(today);
        let days: Vec<DailyTotal> = start
            .iter_days()
            .take_while(|date| *date <= today)
            .map(|date| DailyTotal {
                date,
                seconds: records
                    .iter()
                    .find(|r| r.date == date)
                    .map(|r| r.total_seconds)
                    .unwrap_or(0),
            })
            .collect();

        let total_seconds = days.iter().map(|d| d.seconds).sum();
        let active_days = days.iter().filter(|d| d.seconds > 0).count() as u64;
        let average_seconds = if active_days > 0 {
            total_seconds / active_days
        } else {
            0
        };

        Self {
            days,
            total_seconds,
            average_seconds,
        }
    }
}
