//! Three-hourly NARR analysis times.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::config::{validate_interval, SLICE_HOURS};
use crate::error::{ArchiveError, Result};

/// One NARR analysis time, always on a 3-hour boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlice(NaiveDateTime);

impl TimeSlice {
    /// Build a slice from calendar fields, truncating `hour` down to the
    /// nearest multiple of three.
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            ArchiveError::InvalidDate(format!("{:04}-{:02}-{:02}", year, month, day))
        })?;
        if hour > 23 {
            return Err(ArchiveError::InvalidDate(format!("hour {} out of range", hour)));
        }
        Ok(Self::containing(date.and_time(NaiveTime::MIN) + Duration::hours(hour as i64)))
    }

    /// The slice whose 3-hour window contains `at`.
    pub fn containing(at: NaiveDateTime) -> Self {
        let hour = at.hour() - at.hour() % SLICE_HOURS;
        Self(at.date().and_time(NaiveTime::MIN) + Duration::hours(hour as i64))
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// The slice `interval` after this one.
    pub fn next(&self, interval: Duration) -> Self {
        Self::containing(self.0 + interval)
    }

    /// Every slice from the start of `start` to the end of `end`, inclusive,
    /// spaced `interval` apart.
    pub fn range(start: NaiveDate, end: NaiveDate, interval: Duration) -> Result<Slices> {
        validate_interval(interval)?;
        Ok(Slices {
            next: Self::containing(start.and_time(NaiveTime::MIN)),
            end: end.and_time(NaiveTime::MIN) + Duration::days(1),
            interval,
        })
    }
}

impl fmt::Display for TimeSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Iterator over consecutive slices; see [`TimeSlice::range`].
#[derive(Debug, Clone)]
pub struct Slices {
    next: TimeSlice,
    // exclusive
    end: NaiveDateTime,
    interval: Duration,
}

impl Iterator for Slices {
    type Item = TimeSlice;

    fn next(&mut self) -> Option<TimeSlice> {
        if self.next.datetime() >= self.end {
            return None;
        }
        let current = self.next;
        self.next = current.next(self.interval);
        Some(current)
    }
}
