//! Check-in status derived from a history.
//!
//! Everything here is calendar-day based: instants are projected into the
//! engine's reference offset and truncated to a date before comparison.
//! Events whose date lies after `now`'s date are treated as clock skew and
//! ignored.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CheckInHistory;

/// `days_missed` for a subject who has never checked in.
pub const NEVER_CHECKED_IN: u32 = 999;

/// Days without a check-in at which the status turns overdue.
pub const OVERDUE_AFTER_DAYS: u32 = 2;

/// Coarse health indicator for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    /// Checked in today
    Good,
    /// One day missed
    Warning,
    /// Emergency contact is due to be notified
    Overdue,
}

impl StatusLevel {
    pub fn from_days_missed(days_missed: u32) -> Self {
        match days_missed {
            0 => StatusLevel::Good,
            d if d >= OVERDUE_AFTER_DAYS => StatusLevel::Overdue,
            _ => StatusLevel::Warning,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StatusLevel::Good => "All good",
            StatusLevel::Warning => "One day missed, please check in soon",
            StatusLevel::Overdue => {
                "No check-in for 2 or more days, your emergency contact will be notified"
            }
        }
    }
}

/// Snapshot of a subject's check-in state at some instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInStatus {
    pub last_check_in: Option<DateTime<Utc>>,
    pub checked_in_today: bool,
    pub days_missed: u32,
    pub consecutive_days: u32,
    pub level: StatusLevel,
}

/// One cell of the recent-days strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayMark {
    pub date: NaiveDate,
    pub checked_in: bool,
    pub is_today: bool,
}

/// Pure status calculator bound to a reference offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakEngine {
    offset: FixedOffset,
}

impl Default for StreakEngine {
    fn default() -> Self {
        Self::utc()
    }
}

impl StreakEngine {
    /// Engine with UTC day boundaries.
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// `None` if the offset is outside ±24h.
    pub fn from_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours.checked_mul(3600)?).map(Self::with_offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `at` in the reference offset.
    pub fn calendar_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Distinct check-in dates not after `today`, most recent first.
    fn checked_days(&self, history: &CheckInHistory, today: NaiveDate) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = history
            .events()
            .iter()
            .map(|e| self.calendar_day(e.at()))
            .filter(|d| *d <= today)
            .collect();
        days.sort_unstable_by(|a, b| b.cmp(a));
        days.dedup();
        days
    }

    pub fn is_checked_in_today(&self, history: &CheckInHistory, now: DateTime<Utc>) -> bool {
        let today = self.calendar_day(now);
        history
            .events()
            .iter()
            .any(|e| self.calendar_day(e.at()) == today)
    }

    /// Calendar days since the most recent check-in, or
    /// [`NEVER_CHECKED_IN`] when there is none.
    pub fn days_missed(&self, history: &CheckInHistory, now: DateTime<Utc>) -> u32 {
        let today = self.calendar_day(now);
        match self.checked_days(history, today).first() {
            Some(last) => u32::try_from((today - *last).num_days()).unwrap_or(u32::MAX),
            None => NEVER_CHECKED_IN,
        }
    }

    /// Length of the run of consecutive check-in days ending today, or
    /// ending yesterday while today is still open.
    pub fn consecutive_days(&self, history: &CheckInHistory, now: DateTime<Utc>) -> u32 {
        let today = self.calendar_day(now);
        let days = self.checked_days(history, today);

        let Some(&first) = days.first() else {
            return 0;
        };
        let start = if first == today || Some(first) == today.pred_opt() {
            first
        } else {
            return 0;
        };

        let run = days
            .iter()
            .enumerate()
            .take_while(|(k, day)| {
                start.checked_sub_signed(Duration::days(*k as i64)) == Some(**day)
            })
            .count();
        u32::try_from(run).unwrap_or(u32::MAX)
    }

    pub fn status(&self, history: &CheckInHistory, now: DateTime<Utc>) -> CheckInStatus {
        let days_missed = self.days_missed(history, now);
        CheckInStatus {
            last_check_in: history.last_check_in(),
            checked_in_today: self.is_checked_in_today(history, now),
            days_missed,
            consecutive_days: self.consecutive_days(history, now),
            level: StatusLevel::from_days_missed(days_missed),
        }
    }

    /// The last `n` calendar days ending today, oldest first.
    pub fn recent_days(&self, history: &CheckInHistory, now: DateTime<Utc>, n: usize) -> Vec<DayMark> {
        let today = self.calendar_day(now);
        let checked = self.checked_days(history, today);

        (0..n)
            .rev()
            .filter_map(|back| today.checked_sub_signed(Duration::days(back as i64)))
            .map(|date| DayMark {
                date,
                checked_in: checked.binary_search_by(|d| date.cmp(d)).is_ok(),
                is_today: date == today,
            })
            .collect()
    }
}
