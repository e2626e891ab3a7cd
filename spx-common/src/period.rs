//! Commission period (`YYYY-MM`)
//!
//! A period is a calendar month and the unit of commission computation.
//! Parsing is strict: exactly four year digits, a dash, two month digits.

use crate::{Error, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!(
                "Invalid period {:04}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    /// Period containing the given date
    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a period and reject it if it lies after the month of `today`.
    pub fn parse_not_future(s: &str, today: NaiveDate) -> Result<Self> {
        let period: Period = s.parse()?;
        if period > Self::of_date(today) {
            return Err(Error::InvalidInput(format!(
                "Cannot compute commissions for future period {}",
                period
            )));
        }
        Ok(period)
    }

    /// Validate a period string for commission computation against the current date.
    pub fn validate(s: &str) -> Result<Self> {
        Self::parse_not_future(s, crate::time::today())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month
    pub fn first_day(&self) -> NaiveDate {
        // Fields are range-checked on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// First day of the following month (exclusive upper bound of the period)
    pub fn end_exclusive(&self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Period `months` months before this one
    pub fn months_back(&self, months: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) - months as i64;
        let index = index.max(12);
        Self {
            year: (index / 12) as i32,
            month: (index % 12) as u32 + 1,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(Error::InvalidInput(format!(
                "Invalid period format '{}', expected YYYY-MM",
                s
            )));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid period year in '{}'", s)))?;
        let month: u32 = s[5..]
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid period month in '{}'", s)))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_valid_period() {
        let p: Period = "2024-06".parse().unwrap();
        assert_eq!(p.year(), 2024);
        assert_eq!(p.month(), 6);
        assert_eq!(p.to_string(), "2024-06");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["2024-6", "24-06", "2024/06", "2024-13", "2024-00", "2024-06-01", "", "abcd-ef", " 2024-06"] {
            let err = bad.parse::<Period>().unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_future_period_rejected() {
        let today = date(2024, 6, 15);
        assert!(Period::parse_not_future("2024-06", today).is_ok());
        assert!(Period::parse_not_future("2023-12", today).is_ok());

        let err = Period::parse_not_future("2024-07", today).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_month_bounds() {
        let p: Period = "2024-12".parse().unwrap();
        assert_eq!(p.first_day(), date(2024, 12, 1));
        assert_eq!(p.end_exclusive(), date(2025, 1, 1));
        assert_eq!(Period::of_date(date(2024, 12, 31)), p);
    }

    #[test]
    fn test_months_back_crosses_year() {
        let p: Period = "2024-02".parse().unwrap();
        assert_eq!(p.months_back(3).to_string(), "2023-11");
        assert_eq!(p.months_back(0), p);
    }

    #[test]
    fn test_ordering_follows_calendar() {
        let a: Period = "2023-12".parse().unwrap();
        let b: Period = "2024-01".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_string_conversions() {
        let p: Period = "2024-03".parse().unwrap();
        assert_eq!(String::from(p), "2024-03");
        assert!(Period::try_from("2024-3".to_string()).is_err());
    }
}
