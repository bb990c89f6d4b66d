//! Calendar time for billing
//!
//! Billing only ever reasons about calendar dates: due dates, overdue checks and
//! statement periods. "Today" is always taken in the institution's own timezone
//! and always comes from a [`Clock`], so tests can pin it.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Timezone wrapper for the institution's billing calendar
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the calendar date of a UTC instant in this timezone
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Source of the current instant and calendar date
pub trait Clock: Send + Sync {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;

    /// The current calendar date in the billing timezone
    fn today(&self) -> NaiveDate;
}

/// Wall-clock time, with "today" resolved in the institution's timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Timezone,
}

impl SystemClock {
    pub fn new(timezone: Timezone) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        self.timezone.local_date(Utc::now())
    }
}

/// A clock pinned to a date, advanced manually; used by tests and replays
#[derive(Debug, Clone)]
pub struct FixedClock {
    today: Arc<RwLock<NaiveDate>>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Arc::new(RwLock::new(today)),
        }
    }

    /// Moves the clock to another date
    pub fn set(&self, today: NaiveDate) {
        if let Ok(mut guard) = self.today.write() {
            *guard = today;
        }
    }

    /// Moves the clock forward by whole days
    pub fn advance_days(&self, days: u64) {
        if let Ok(mut guard) = self.today.write() {
            *guard = *guard + chrono::Days::new(days);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.today()
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }

    fn today(&self) -> NaiveDate {
        match self.today.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// An inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Creates an inclusive range; `from` must not be after `to`
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, TemporalError> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// January 1st through December 31st of a calendar year
    pub fn calendar_year(year: i32) -> Result<Self, TemporalError> {
        let from = NaiveDate::from_ymd_opt(year, 1, 1);
        let to = NaiveDate::from_ymd_opt(year, 12, 31);
        match (from, to) {
            (Some(from), Some(to)) => Self::new(from, to),
            _ => Err(TemporalError::InvalidRange {
                from: NaiveDate::MIN,
                to: NaiveDate::MIN,
            }),
        }
    }

    /// Returns true if the date falls within the range (inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    /// Calendar year of the start of the range
    pub fn start_year(&self) -> i32 {
        self.from.year()
    }
}

/// Whole days from `earlier` to `later`; negative when `later` is before `earlier`
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}
