//! Calendar window policy.
//!
//! # Responsibility
//! - Decide whether a target day may be marked at a given instant.
//! - Expose the set of currently markable days so clients render the same
//!   window the server enforces.
//!
//! # Invariants
//! - The deadline for `day` is `deadline_time` UTC on the previous day.
//! - The advance window is `[today, today + advance_days]`, both inclusive,
//!   where `today` is the UTC date of `now`.
//! - Pure functions only; nothing here reads the wall clock.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_DEADLINE_HOUR: u32 = 19;
pub const DEFAULT_ADVANCE_DAYS: u32 = 7;

/// Reason a day cannot be marked right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowViolation {
    DeadlinePassed {
        day: NaiveDate,
        deadline: DateTime<Utc>,
    },
    TooFarInAdvance {
        day: NaiveDate,
        horizon_days: u32,
    },
}

impl Display for WindowViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadlinePassed { day, deadline } => write!(
                f,
                "deadline for {day} passed at {}",
                deadline.format("%Y-%m-%d %H:%M UTC")
            ),
            Self::TooFarInAdvance { day, horizon_days } => write!(
                f,
                "{day} is more than {horizon_days} days ahead"
            ),
        }
    }
}

impl Error for WindowViolation {}

/// Deadline and advance-window rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    deadline_time: NaiveTime,
    advance_days: u32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            deadline_time: NaiveTime::from_hms_opt(DEFAULT_DEADLINE_HOUR, 0, 0)
                .unwrap_or(NaiveTime::MIN),
            advance_days: DEFAULT_ADVANCE_DAYS,
        }
    }
}

impl WindowPolicy {
    pub fn new(deadline_time: NaiveTime, advance_days: u32) -> Self {
        Self {
            deadline_time,
            advance_days,
        }
    }

    pub fn deadline_time(&self) -> NaiveTime {
        self.deadline_time
    }

    pub fn advance_days(&self) -> u32 {
        self.advance_days
    }

    /// Instant after which `day` may no longer be marked.
    pub fn deadline_for(&self, day: NaiveDate) -> DateTime<Utc> {
        let previous = day.pred_opt().unwrap_or(day);
        previous.and_time(self.deadline_time).and_utc()
    }

    /// Returns whether `day` lies in `[today, today + advance_days]`.
    pub fn is_within_advance_window(&self, day: NaiveDate, today: NaiveDate) -> bool {
        if day < today {
            return false;
        }
        today
            .checked_add_days(Days::new(u64::from(self.advance_days)))
            .map_or(true, |last| day <= last)
    }

    /// Checks both rules and reports which one failed.
    pub fn evaluate(&self, day: NaiveDate, now: DateTime<Utc>) -> Result<(), WindowViolation> {
        let deadline = self.deadline_for(day);
        if now > deadline {
            return Err(WindowViolation::DeadlinePassed { day, deadline });
        }
        if !self.is_within_advance_window(day, now.date_naive()) {
            return Err(WindowViolation::TooFarInAdvance {
                day,
                horizon_days: self.advance_days,
            });
        }
        Ok(())
    }

    pub fn can_mark(&self, day: NaiveDate, now: DateTime<Utc>) -> bool {
        self.evaluate(day, now).is_ok()
    }

    /// Days that may be marked at `now`, ascending.
    pub fn markable_days(&self, now: DateTime<Utc>) -> Vec<NaiveDate> {
        let today = now.date_naive();
        today
            .iter_days()
            .take(self.advance_days as usize + 1)
            .filter(|day| self.can_mark(*day, now))
            .collect()
    }
}
