//! Attendance use-case service.
//!
//! # Responsibility
//! - Validate and authorize-by-time every mark request before persistence.
//! - Expose month reads as stored rows and as a default-merged calendar.
//!
//! # Invariants
//! - Validation and window checks run before any store access; failures
//!   leave no side effects.
//! - `mark` is idempotent per `(subject_id, day, meals)`.
//! - "Now" is a parameter, never read from the clock here.

use crate::logging::log_field;
use crate::model::attendance::{effective_meals, AttendanceRecord, DayAttendance, Meals};
use crate::model::day::{parse_day, DayParseError, YearMonth};
use crate::policy::window::{WindowPolicy, WindowViolation};
use crate::repo::attendance_repo::{AttendanceRepository, RepoError};
use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for attendance use-cases.
#[derive(Debug)]
pub enum AttendanceError {
    /// Day or month input failed the civil-date grammar.
    InvalidFormat(DayParseError),
    /// Subject identifier is empty.
    MissingSubject,
    /// The day's cutoff instant has passed.
    DeadlinePassed {
        day: NaiveDate,
        deadline: DateTime<Utc>,
    },
    /// The day lies beyond the advance window.
    TooFarInAdvance { day: NaiveDate, horizon_days: u32 },
    /// Storage I/O failure; the caller may retry with the same arguments.
    Transient(RepoError),
    /// Store rejected the input or holds a malformed row; retrying won't help.
    Storage(RepoError),
}

impl AttendanceError {
    /// Returns whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Stable machine-readable code for API mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) | Self::MissingSubject => "invalid-format",
            Self::DeadlinePassed { .. } => "deadline-passed",
            Self::TooFarInAdvance { .. } => "too-far-advance",
            Self::Transient(_) => "transient",
            Self::Storage(RepoError::InvalidInput(_) | RepoError::InvalidRange { .. }) => {
                "invalid-format"
            }
            Self::Storage(_) => "invalid-data",
        }
    }
}

impl Display for AttendanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(err) => write!(f, "{err}"),
            Self::MissingSubject => write!(f, "subject id is required"),
            Self::DeadlinePassed { day, deadline } => write!(
                f,
                "cannot mark {day}: deadline passed at {}",
                deadline.format("%Y-%m-%d %H:%M UTC")
            ),
            Self::TooFarInAdvance { day, horizon_days } => write!(
                f,
                "cannot mark {day}: only the next {horizon_days} days may be marked"
            ),
            Self::Transient(err) => write!(f, "attendance storage unavailable: {err}"),
            Self::Storage(err) => write!(f, "attendance storage rejected request: {err}"),
        }
    }
}

impl Error for AttendanceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFormat(err) => Some(err),
            Self::Transient(err) | Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DayParseError> for AttendanceError {
    fn from(value: DayParseError) -> Self {
        Self::InvalidFormat(value)
    }
}

impl From<RepoError> for AttendanceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(_) => Self::Transient(value),
            other => Self::Storage(other),
        }
    }
}

impl From<WindowViolation> for AttendanceError {
    fn from(value: WindowViolation) -> Self {
        match value {
            WindowViolation::DeadlinePassed { day, deadline } => {
                Self::DeadlinePassed { day, deadline }
            }
            WindowViolation::TooFarInAdvance { day, horizon_days } => {
                Self::TooFarInAdvance { day, horizon_days }
            }
        }
    }
}

/// Attendance service facade over repository implementations.
pub struct AttendanceService<R: AttendanceRepository> {
    repo: R,
    policy: WindowPolicy,
}

impl<R: AttendanceRepository> AttendanceService<R> {
    pub fn new(repo: R, policy: WindowPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// Marks meals for one subject and day.
    ///
    /// # Contract
    /// - Rejects malformed `day` with `InvalidFormat`.
    /// - Rejects with `DeadlinePassed` / `TooFarInAdvance` per window policy.
    /// - Otherwise upserts and returns the persisted record.
    pub fn mark(
        &self,
        subject_id: &str,
        day: &str,
        meals: Meals,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if subject_id.trim().is_empty() {
            return Err(AttendanceError::MissingSubject);
        }
        let day = parse_day(day)?;

        if let Err(violation) = self.policy.evaluate(day, now) {
            warn!(
                "event=attendance_mark module=service status=rejected subject={} day={} reason={}",
                log_field(subject_id),
                day,
                match violation {
                    WindowViolation::DeadlinePassed { .. } => "deadline_passed",
                    WindowViolation::TooFarInAdvance { .. } => "too_far_advance",
                }
            );
            return Err(violation.into());
        }

        let upserted = self.repo.upsert(subject_id, day, meals)?;
        info!(
            "event=attendance_mark module=service status=ok subject={} day={} cut={}",
            log_field(subject_id),
            day,
            upserted.record.is_cut()
        );
        Ok(upserted.record)
    }

    /// Returns stored records for one subject and month.
    ///
    /// Days without a record are absent; they mean fully present.
    pub fn get_month(
        &self,
        subject_id: &str,
        year_month: &str,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let month = YearMonth::parse(year_month)?;
        Ok(self.repo.query_by_month(subject_id, month)?)
    }

    /// Returns every day of the month with default-merged meals.
    pub fn month_view(
        &self,
        subject_id: &str,
        year_month: &str,
    ) -> Result<Vec<DayAttendance>, AttendanceError> {
        let month = YearMonth::parse(year_month)?;
        let stored = self
            .repo
            .query_by_month(subject_id, month)?
            .into_iter()
            .map(|record| (record.day, record))
            .collect::<HashMap<_, _>>();

        Ok(month
            .days()
            .into_iter()
            .map(|day| {
                let record = stored.get(&day);
                DayAttendance {
                    day,
                    meals: effective_meals(record),
                    explicit: record.is_some(),
                }
            })
            .collect())
    }

    /// Days currently open for marking.
    pub fn markable_days(&self, now: DateTime<Utc>) -> Vec<NaiveDate> {
        self.policy.markable_days(now)
    }
}
