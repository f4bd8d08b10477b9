//! Time-bucket encoding.
//!
//! A time bucket is an integer whose decimal digits spell the UTC instant
//! truncated to a granularity: `YYYYMM` for months, `YYYYMMDD` for days,
//! `YYYYMMDDHH` for hours, `YYYYMMDDHHmm` for minutes and `YYYYMMDDHHmmss`
//! for seconds. Tables of the same metric exist once per granularity and are
//! named `<granularity>_<base>`.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Second,
        Granularity::Minute,
        Granularity::Hour,
        Granularity::Day,
        Granularity::Month,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }

    /// `<granularity>_<base>`, the storage name of a per-granularity table.
    pub fn table_name(&self, base: &str) -> String {
        format!("{}_{}", self.name(), base)
    }

    pub fn bucket(&self, instant: DateTime<Utc>) -> i64 {
        let month = instant.year() as i64 * 100 + instant.month() as i64;
        if *self == Granularity::Month {
            return month;
        }
        let day = month * 100 + instant.day() as i64;
        let hour = day * 100 + instant.hour() as i64;
        let minute = hour * 100 + instant.minute() as i64;
        match self {
            Granularity::Day => day,
            Granularity::Hour => hour,
            Granularity::Minute => minute,
            Granularity::Second => minute * 100 + instant.second() as i64,
            Granularity::Month => month,
        }
    }

    pub fn bucket_of_millis(&self, millis: i64) -> Option<i64> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(|instant| self.bucket(instant))
    }

    /// First instant of the window a bucket denotes. `None` for malformed buckets.
    pub fn window_start(&self, bucket: i64) -> Option<DateTime<Utc>> {
        let (date, clock) = match self {
            Granularity::Month => ((bucket, 1), (0, 0, 0)),
            Granularity::Day => ((bucket / 100, bucket % 100), (0, 0, 0)),
            Granularity::Hour => ((bucket / 10_000, bucket / 100 % 100), (bucket % 100, 0, 0)),
            Granularity::Minute => (
                (bucket / 1_000_000, bucket / 10_000 % 100),
                (bucket / 100 % 100, bucket % 100, 0),
            ),
            Granularity::Second => (
                (bucket / 100_000_000, bucket / 1_000_000 % 100),
                (bucket / 10_000 % 100, bucket / 100 % 100, bucket % 100),
            ),
        };
        let ((year_month, day), (hour, minute, second)) = (date, clock);
        let year = year_month / 100;
        let month = year_month % 100;
        Utc.with_ymd_and_hms(
            i32::try_from(year).ok()?,
            u32::try_from(month).ok()?,
            u32::try_from(day).ok()?,
            u32::try_from(hour).ok()?,
            u32::try_from(minute).ok()?,
            u32::try_from(second).ok()?,
        )
        .single()
    }

    /// Start of the window containing `instant`.
    pub fn floor(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window_start(self.bucket(instant))
    }

    /// Resolves an inclusive millisecond range into an inclusive bucket range.
    ///
    /// The start resolves to the window containing `start_millis`; the end
    /// resolves to the last window lying wholly at or before `end_millis`, so
    /// a partially elapsed window at the end is never included. Returns `None`
    /// when the range covers no complete window.
    pub fn resolve_range(&self, start_millis: i64, end_millis: i64) -> Option<(i64, i64)> {
        let start = self.bucket_of_millis(start_millis)?;
        let after_end = Utc.timestamp_millis_opt(end_millis.checked_add(1)?).single()?;
        let last_instant = self.floor(after_end)? - Duration::milliseconds(1);
        let end = self.bucket(last_instant);
        if end < start {
            return None;
        }
        Some((start, end))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .iter()
            .copied()
            .find(|g| g.name() == s)
            .ok_or_else(|| format!("unknown granularity: {}", s))
    }
}
