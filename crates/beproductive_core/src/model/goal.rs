//! Goal countdown/count-up span.
//!
//! Countdown goals measure the distance from now to the target date; counter
//! goals measure the time elapsed since it. Calendar units are approximated
//! with fixed-length years (365.25 days) and months (30.44 days).

use chrono::{DateTime, Utc};

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 60.0 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: f64 = 24.0 * SECONDS_PER_HOUR;
const SECONDS_PER_MONTH: f64 = 30.44 * SECONDS_PER_DAY;
const SECONDS_PER_YEAR: f64 = 365.25 * SECONDS_PER_DAY;

/// Broken-down distance between now and a goal date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalSpan {
    pub years: u64,
    pub months: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    /// A countdown whose date has passed, or a counter whose date is still
    /// in the future.
    pub is_past: bool,
}

impl GoalSpan {
    pub fn between(now: DateTime<Utc>, target: DateTime<Utc>, is_counter: bool) -> Self {
        let diff_ms = if is_counter {
            (now - target).num_milliseconds()
        } else {
            (target - now).num_milliseconds()
        };
        let total = diff_ms.unsigned_abs() as f64 / 1000.0;

        Self {
            years: (total / SECONDS_PER_YEAR).floor() as u64,
            months: ((total % SECONDS_PER_YEAR) / SECONDS_PER_MONTH).floor() as u64,
            days: ((total % SECONDS_PER_MONTH) / SECONDS_PER_DAY).floor() as u64,
            hours: ((total % SECONDS_PER_DAY) / SECONDS_PER_HOUR).floor() as u64,
            minutes: ((total % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE).floor() as u64,
            seconds: (total % SECONDS_PER_MINUTE).floor() as u64,
            is_past: diff_ms < 0,
        }
    }

    /// A countdown that reached its date is complete; counters never are.
    pub fn is_completed(&self, is_counter: bool) -> bool {
        !is_counter && self.is_past
    }
}
