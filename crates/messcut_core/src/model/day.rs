//! Civil date grammar (`YYYY-MM-DD`, `YYYY-MM`).
//!
//! # Responsibility
//! - Reject malformed date input before any policy or storage access.
//! - Convert between canonical text and `chrono::NaiveDate`.
//!
//! # Invariants
//! - Only ASCII digits in fixed positions are accepted; no time, no zone.
//! - A string that matches the grammar must also be a real calendar date.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid day regex"));
static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}$").expect("valid year-month regex"));

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Errors raised while parsing civil dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayParseError {
    /// Input does not match `YYYY-MM-DD`.
    InvalidDayFormat(String),
    /// Input matches the grammar but names no real day (e.g. `2025-02-30`).
    NonexistentDay(String),
    /// Input does not match `YYYY-MM` or the month is out of range.
    InvalidYearMonth(String),
}

impl Display for DayParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDayFormat(value) => {
                write!(f, "invalid day `{value}`; expected YYYY-MM-DD")
            }
            Self::NonexistentDay(value) => write!(f, "day `{value}` is not a calendar date"),
            Self::InvalidYearMonth(value) => {
                write!(f, "invalid month `{value}`; expected YYYY-MM")
            }
        }
    }
}

impl Error for DayParseError {}

/// Parses a strict `YYYY-MM-DD` civil date.
pub fn parse_day(input: &str) -> Result<NaiveDate, DayParseError> {
    if !DAY_RE.is_match(input) {
        return Err(DayParseError::InvalidDayFormat(input.to_string()));
    }
    NaiveDate::parse_from_str(input, DAY_FORMAT)
        .map_err(|_| DayParseError::NonexistentDay(input.to_string()))
}

/// Formats a day in canonical storage form.
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Calendar month, used for per-subject month queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Parses a strict `YYYY-MM` value.
    pub fn parse(input: &str) -> Result<Self, DayParseError> {
        if !YEAR_MONTH_RE.is_match(input) {
            return Err(DayParseError::InvalidYearMonth(input.to_string()));
        }
        let invalid = || DayParseError::InvalidYearMonth(input.to_string());
        let year = input[..4].parse::<i32>().map_err(|_| invalid())?;
        let month = input[5..].parse::<u32>().map_err(|_| invalid())?;
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }

    /// Month containing `day`.
    pub fn of(day: NaiveDate) -> Self {
        Self {
            year: day.year(),
            month: day.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // Construction guarantees the first of the month exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let first = self.first_day();
        first
            .checked_add_months(chrono::Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(first)
    }

    /// Every day of the month in ascending order.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.first_day()
            .iter_days()
            .take_while(|day| *day <= self.last_day())
            .collect()
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
