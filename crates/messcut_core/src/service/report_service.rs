//! Aggregation use-cases: daily meal summary and mess-cut reports.
//!
//! # Responsibility
//! - Pull records and roster, then merge absent days to fully present.
//! - Produce serializable summary/detail structures for report encoders.
//!
//! # Invariants
//! - Output rows follow roster order; no implicit sort by absence.
//! - A cut is an explicit all-false record; missing records never count.
//! - Requested dates are deduplicated before counting.
//! - Read-only: nothing here mutates storage.

use crate::model::attendance::{effective_meals, AttendanceRecord, SubjectId};
use crate::model::day::{parse_day, DayParseError};
use crate::model::subject::Subject;
use crate::repo::attendance_repo::{AttendanceRepository, RepoError};
use crate::repo::roster_repo::RosterProvider;
use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for report use-cases.
#[derive(Debug)]
pub enum ReportError {
    InvalidFormat(DayParseError),
    /// No dates were requested.
    EmptyDateSet,
    InvalidRange { start: NaiveDate, end: NaiveDate },
    Repo(RepoError),
}

impl ReportError {
    /// Returns whether retrying the same request may succeed.
    ///
    /// Only storage I/O failures qualify; malformed input or persisted data
    /// fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Repo(RepoError::Db(_)))
    }
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(err) => write!(f, "{err}"),
            Self::EmptyDateSet => write!(f, "at least one date is required"),
            Self::InvalidRange { start, end } => {
                write!(f, "range start {start} is after end {end}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFormat(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DayParseError> for ReportError {
    fn from(value: DayParseError) -> Self {
        Self::InvalidFormat(value)
    }
}

impl From<RepoError> for ReportError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidRange { start, end } => Self::InvalidRange { start, end },
            other => Self::Repo(other),
        }
    }
}

/// Per-meal absence counts across the roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MealCounts {
    pub morning: u32,
    pub noon: u32,
    pub night: u32,
}

/// One roster subject's absences for the summarized day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDetail {
    pub subject_id: SubjectId,
    pub morning_absent: bool,
    pub noon_absent: bool,
    pub night_absent: bool,
}

/// Facility-wide view of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub day: NaiveDate,
    pub summary: MealCounts,
    pub details: Vec<DailyDetail>,
}

/// Total cuts of one roster subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CutSummaryRow {
    pub subject_id: SubjectId,
    pub total_cuts: u32,
}

/// One counted cut day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CutDetail {
    pub subject_id: SubjectId,
    pub day: NaiveDate,
}

/// Mess-cut report over an explicit set of days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutReport {
    /// Deduplicated requested days, ascending.
    pub dates: Vec<NaiveDate>,
    pub summary: Vec<CutSummaryRow>,
    pub details: Vec<CutDetail>,
}

/// Report service over record storage and a roster provider.
pub struct ReportService<R: AttendanceRepository, P: RosterProvider> {
    records: R,
    roster: P,
}

impl<R: AttendanceRepository, P: RosterProvider> ReportService<R, P> {
    pub fn new(records: R, roster: P) -> Self {
        Self { records, roster }
    }

    /// Summarizes meal absences of every reportable subject for `day`.
    pub fn daily_summary(&self, day: &str) -> Result<DailySummary, ReportError> {
        let day = parse_day(day)?;
        let roster = self.roster.reportable_subjects()?;
        let records = self.records.query_by_date_set(&BTreeSet::from([day]))?;

        let summary = summarize_day(day, &records, &roster);
        info!(
            "event=report_daily module=service status=ok day={} subjects={} absent_morning={} absent_noon={} absent_night={}",
            day,
            roster.len(),
            summary.summary.morning,
            summary.summary.noon,
            summary.summary.night
        );
        Ok(summary)
    }

    /// Counts mess cuts per reportable subject over explicit `dates`.
    pub fn range_cut_report<S: AsRef<str>>(&self, dates: &[S]) -> Result<CutReport, ReportError> {
        let days = dates
            .iter()
            .map(|value| parse_day(value.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        self.cut_report_for(days)
    }

    /// Counts mess cuts over the inclusive contiguous range `start..=end`.
    pub fn range_cut_report_between(
        &self,
        start: &str,
        end: &str,
    ) -> Result<CutReport, ReportError> {
        let start = parse_day(start)?;
        let end = parse_day(end)?;
        if start > end {
            return Err(ReportError::InvalidRange { start, end });
        }
        let days = start
            .iter_days()
            .take_while(|day| *day <= end)
            .collect::<BTreeSet<_>>();
        self.cut_report_for(days)
    }

    fn cut_report_for(&self, days: BTreeSet<NaiveDate>) -> Result<CutReport, ReportError> {
        if days.is_empty() {
            return Err(ReportError::EmptyDateSet);
        }

        let roster = self.roster.reportable_subjects()?;
        let records = match (days.first(), days.last()) {
            // Contiguous sets read as one range scan.
            (Some(first), Some(last))
                if (*last - *first).num_days() + 1 == days.len() as i64 =>
            {
                self.records.query_by_date_range(*first, *last)?
            }
            _ => self.records.query_by_date_set(&days)?,
        };

        let report = summarize_cuts(&days, &records, &roster);
        info!(
            "event=report_cuts module=service status=ok dates={} subjects={} cuts={}",
            days.len(),
            roster.len(),
            report.details.len()
        );
        Ok(report)
    }
}

/// Roster entries with repeated `subject_id`s dropped, first-seen order kept.
fn unique_roster(roster: &[Subject]) -> Vec<&Subject> {
    let mut seen = HashSet::new();
    roster
        .iter()
        .filter(|subject| seen.insert(subject.subject_id.as_str()))
        .collect()
}

/// Merges one day's records with the roster.
///
/// Subjects without a record count as fully present. Records of subjects
/// outside the roster or of other days are ignored. A subject listed twice
/// is reported once.
pub fn summarize_day(
    day: NaiveDate,
    records: &[AttendanceRecord],
    roster: &[Subject],
) -> DailySummary {
    let by_subject = records
        .iter()
        .filter(|record| record.day == day)
        .map(|record| (record.subject_id.as_str(), record))
        .collect::<HashMap<_, _>>();

    let mut summary = MealCounts::default();
    let details = unique_roster(roster)
        .into_iter()
        .map(|subject| {
            let meals = effective_meals(by_subject.get(subject.subject_id.as_str()).copied());
            summary.morning += u32::from(!meals.morning);
            summary.noon += u32::from(!meals.noon);
            summary.night += u32::from(!meals.night);
            DailyDetail {
                subject_id: subject.subject_id.clone(),
                morning_absent: !meals.morning,
                noon_absent: !meals.noon,
                night_absent: !meals.night,
            }
        })
        .collect();

    DailySummary {
        day,
        summary,
        details,
    }
}

/// Counts explicit cut records per roster subject within `days`.
pub fn summarize_cuts(
    days: &BTreeSet<NaiveDate>,
    records: &[AttendanceRecord],
    roster: &[Subject],
) -> CutReport {
    let mut cut_days: HashMap<&str, BTreeSet<NaiveDate>> = HashMap::new();
    for record in records {
        if record.is_cut() && days.contains(&record.day) {
            cut_days
                .entry(record.subject_id.as_str())
                .or_default()
                .insert(record.day);
        }
    }

    let roster = unique_roster(roster);
    let mut summary = Vec::with_capacity(roster.len());
    let mut details = Vec::new();
    for subject in roster {
        let subject_days = cut_days.get(subject.subject_id.as_str());
        let total_cuts = subject_days.map_or(0, |set| set.len() as u32);
        summary.push(CutSummaryRow {
            subject_id: subject.subject_id.clone(),
            total_cuts,
        });
        details.extend(subject_days.into_iter().flatten().map(|day| CutDetail {
            subject_id: subject.subject_id.clone(),
            day: *day,
        }));
    }

    CutReport {
        dates: days.iter().copied().collect(),
        summary,
        details,
    }
}
