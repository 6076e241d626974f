//! # Settlement Periods
//!
//! Half-open time intervals `[start, end)` over which payouts are computed.
//!
//! ## Cadences
//! ```text
//! Monthly:  [2026-09-01T00:00Z, 2026-10-01T00:00Z)
//! Weekly:   [Mon 00:00Z, next Mon 00:00Z)
//!
//!   reference date 2026-10-19 (monthly)
//!          │
//!          ▼
//!   containing  = [2026-10-01, 2026-11-01)
//!   previous()  = [2026-09-01, 2026-10-01)   ◄── what the batch settles
//! ```
//!
//! A sale at exactly `end` belongs to the next period, never both.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Cadence
// =============================================================================

/// How long a settlement period lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodCadence {
    /// Calendar months (UTC).
    #[default]
    Monthly,
    /// ISO weeks starting Monday 00:00 UTC.
    Weekly,
}

impl PeriodCadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodCadence::Monthly => "monthly",
            PeriodCadence::Weekly => "weekly",
        }
    }
}

impl FromStr for PeriodCadence {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(PeriodCadence::Monthly),
            "weekly" => Ok(PeriodCadence::Weekly),
            other => Err(CoreError::InvalidPeriod(format!(
                "unknown cadence '{other}' (expected monthly or weekly)"
            ))),
        }
    }
}

impl fmt::Display for PeriodCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Period
// =============================================================================

/// A half-open settlement interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn first_of_month(year: i32, month: u32) -> CoreResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CoreError::InvalidPeriod(format!("{year}-{month:02} is not a valid month")))
}

fn month_after(date: NaiveDate) -> CoreResult<NaiveDate> {
    if date.month() == 12 {
        first_of_month(date.year() + 1, 1)
    } else {
        first_of_month(date.year(), date.month() + 1)
    }
}

impl Period {
    /// Creates a period, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if start >= end {
            return Err(CoreError::InvalidPeriod(format!(
                "start {} must be before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Period { start, end })
    }

    /// Creates a period from two calendar dates at midnight UTC.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        Period::new(midnight(start), midnight(end))
    }

    /// Parses a `YYYY-MM` month into its calendar-month period.
    ///
    /// ## Example
    /// ```rust
    /// use payout_core::period::Period;
    ///
    /// let period = Period::parse_month("2026-12").unwrap();
    /// assert_eq!(period.start.to_rfc3339(), "2026-12-01T00:00:00+00:00");
    /// assert_eq!(period.end.to_rfc3339(), "2027-01-01T00:00:00+00:00");
    /// ```
    pub fn parse_month(value: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidPeriod(format!("'{value}' is not YYYY-MM"));
        let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let start = first_of_month(year, month)?;
        Period::from_dates(start, month_after(start)?)
    }

    /// Returns the period of the given cadence that contains `at`.
    pub fn containing(cadence: PeriodCadence, at: DateTime<Utc>) -> CoreResult<Self> {
        let date = at.date_naive();
        match cadence {
            PeriodCadence::Monthly => {
                let start = first_of_month(date.year(), date.month())?;
                Period::from_dates(start, month_after(start)?)
            }
            PeriodCadence::Weekly => {
                let offset = date.weekday().num_days_from_monday() as i64;
                let start = date - Duration::days(offset);
                Period::from_dates(start, start + Duration::days(7))
            }
        }
    }

    /// Returns the period of the same cadence that ends where this one starts.
    pub fn previous(&self, cadence: PeriodCadence) -> CoreResult<Self> {
        Period::containing(cadence, self.start - Duration::nanoseconds(1))
    }

    /// Returns the period of the same cadence that starts where this one ends.
    pub fn next(&self, cadence: PeriodCadence) -> CoreResult<Self> {
        Period::containing(cadence, self.end)
    }

    /// Checks if `at` falls within `[start, end)`.
    #[inline]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Checks if two half-open periods share at least one instant.
    #[inline]
    pub fn overlaps(&self, other: &Period) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Accepts `YYYY-MM` or `YYYY-MM-DD..YYYY-MM-DD`.
impl FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("..") {
            Some((start, end)) => {
                let parse = |v: &str| {
                    NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                        .map_err(|e| CoreError::InvalidPeriod(format!("'{v}': {e}")))
                };
                Period::from_dates(parse(start)?, parse(end)?)
            }
            None => Period::parse_month(s),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_month() {
        let period = Period::parse_month("2026-09").unwrap();
        assert_eq!(period.start, at(2026, 9, 1, 0));
        assert_eq!(period.end, at(2026, 10, 1, 0));
        assert!(Period::parse_month("2026-13").is_err());
        assert!(Period::parse_month("26-09").is_err());
        assert!(Period::parse_month("september").is_err());
    }

    #[test]
    fn test_from_str_accepts_ranges() {
        let period: Period = "2026-09-01..2026-09-15".parse().unwrap();
        assert_eq!(period.end, at(2026, 9, 15, 0));
        assert!("2026-09-15..2026-09-01".parse::<Period>().is_err());
    }

    #[test]
    fn test_half_open_containment() {
        let period = Period::parse_month("2026-09").unwrap();
        assert!(period.contains(at(2026, 9, 1, 0)));
        assert!(period.contains(at(2026, 9, 30, 23)));
        assert!(!period.contains(at(2026, 10, 1, 0)));
    }

    #[test]
    fn test_overlaps() {
        let sept = Period::parse_month("2026-09").unwrap();
        let oct = Period::parse_month("2026-10").unwrap();
        let mid: Period = "2026-09-15..2026-10-15".parse().unwrap();
        assert!(!sept.overlaps(&oct));
        assert!(sept.overlaps(&mid));
        assert!(mid.overlaps(&oct));
        assert!(sept.overlaps(&sept));
    }

    #[test]
    fn test_monthly_previous_wraps_year() {
        let jan = Period::containing(PeriodCadence::Monthly, at(2027, 1, 10, 12)).unwrap();
        let dec = jan.previous(PeriodCadence::Monthly).unwrap();
        assert_eq!(dec, Period::parse_month("2026-12").unwrap());
        assert_eq!(dec.next(PeriodCadence::Monthly).unwrap(), jan);
    }

    #[test]
    fn test_weekly_starts_monday() {
        // 2026-10-21 is a Wednesday
        let week = Period::containing(PeriodCadence::Weekly, at(2026, 10, 21, 9)).unwrap();
        assert_eq!(week.start, at(2026, 10, 19, 0));
        assert_eq!(week.end, at(2026, 10, 26, 0));
        assert_eq!(
            week.previous(PeriodCadence::Weekly).unwrap().start,
            at(2026, 10, 12, 0)
        );
    }

    #[test]
    fn test_cadence_parsing() {
        assert_eq!("Weekly".parse::<PeriodCadence>().unwrap(), PeriodCadence::Weekly);
        assert!("daily".parse::<PeriodCadence>().is_err());
        assert_eq!(PeriodCadence::default(), PeriodCadence::Monthly);
    }

    #[test]
    fn test_display() {
        let period = Period::parse_month("2026-09").unwrap();
        assert_eq!(period.to_string(), "[2026-09-01T00:00:00Z, 2026-10-01T00:00:00Z)");
    }
}
