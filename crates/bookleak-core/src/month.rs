//! Calendar months and the archive staleness rule.
//!
//! Game archives are fetched per month. A month that was fetched in full can be
//! served from the cache on later runs, except for the month that is still in
//! progress: new games keep arriving until it ends.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid month `{0}`, expected YYYY/MM")]
pub struct ParseMonthError(String);

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month containing the given date.
    pub fn of(date: impl Datelike) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Parse the trailing `/YYYY/MM` of an archive URL.
    ///
    /// `https://api.chess.com/pub/player/alice/games/2024/03` → 2024/03
    pub fn from_archive_url(url: &str) -> Option<Self> {
        let mut parts = url.trim_end_matches('/').rsplit('/');
        let month = parts.next()?;
        let year = parts.next()?;
        if year.len() != 4 || month.len() != 2 {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = ParseMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMonthError(s.to_string());
        let (year, month) = s.trim().split_once(['/', '-']).ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        Self::new(year, month).ok_or_else(err)
    }
}

impl TryFrom<String> for Month {
    type Error = ParseMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

/// Whether `month` is the month `today` falls in.
pub fn is_current_month(today: NaiveDate, month: Month) -> bool {
    Month::of(today) == month
}

/// Whether a cached archive for `month` may be used instead of re-fetching it.
///
/// Only months strictly before the current one are trusted, whatever the
/// completion flag says.
pub fn archive_reusable(today: NaiveDate, month: Month, marked_complete: bool) -> bool {
    marked_complete && month < Month::of(today)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ordering_is_chronological() {
        let a = Month::new(2024, 12).unwrap();
        let b = Month::new(2025, 1).unwrap();
        let c = Month::new(2025, 2).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Month::new(2025, 0).is_none());
        assert!(Month::new(2025, 13).is_none());
        assert!("2025/13".parse::<Month>().is_err());
        assert!("2025".parse::<Month>().is_err());
    }

    #[test]
    fn parse_and_display() {
        let m: Month = "2025-03".parse().unwrap();
        assert_eq!(m.to_string(), "2025/03");
        assert_eq!("2025/03".parse::<Month>().unwrap(), m);
    }

    #[test]
    fn from_archive_url() {
        let m = Month::from_archive_url("https://api.chess.com/pub/player/alice/games/2024/03");
        assert_eq!(m, Month::new(2024, 3));
        assert_eq!(Month::from_archive_url("https://example.com/games"), None);
        assert_eq!(Month::from_archive_url(""), None);
    }

    #[test]
    fn serde_as_string() {
        let m = Month::new(2023, 7).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"2023/07\"");
        let back: Month = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn past_complete_month_is_reusable() {
        let today = day(2025, 6, 15);
        assert!(archive_reusable(today, Month::new(2025, 5).unwrap(), true));
        assert!(archive_reusable(today, Month::new(2019, 1).unwrap(), true));
    }

    #[test]
    fn incomplete_month_is_not_reusable() {
        let today = day(2025, 6, 15);
        assert!(!archive_reusable(today, Month::new(2025, 5).unwrap(), false));
    }

    #[test]
    fn current_month_never_reusable() {
        let today = day(2025, 6, 1);
        let june = Month::new(2025, 6).unwrap();
        assert!(is_current_month(today, june));
        assert!(!archive_reusable(today, june, true));
    }

    #[test]
    fn future_month_never_reusable() {
        let today = day(2025, 6, 30);
        assert!(!archive_reusable(today, Month::new(2025, 7).unwrap(), true));
    }

    #[test]
    fn month_boundary_rollover() {
        let may = Month::new(2025, 5).unwrap();
        assert!(!archive_reusable(day(2025, 5, 31), may, true));
        assert!(archive_reusable(day(2025, 6, 1), may, true));
    }
}
