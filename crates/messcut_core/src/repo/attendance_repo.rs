//! Attendance record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist one attendance row per `(subject_id, day)`.
//! - Provide a race-safe upsert and the range/set reads aggregation needs.
//!
//! # Invariants
//! - The composite primary key is the only serialization point; no
//!   application-level locks.
//! - A first-insert race resolves through one fallback UPDATE inside the
//!   same transaction; the key conflict never reaches the caller.
//! - Meal flags are written together in one statement; rows are never
//!   deleted.
//! - Read paths reject malformed persisted rows instead of masking them.

use crate::db::DbError;
use crate::logging::log_field;
use crate::model::attendance::{AttendanceRecord, Meals, RecordId};
use crate::model::day::{format_day, parse_day, YearMonth};
use chrono::NaiveDate;
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{
    ffi, params, params_from_iter, Connection, ErrorCode, Row, Transaction, TransactionBehavior,
};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ATTENDANCE_SELECT_SQL: &str = "SELECT
    record_uuid,
    subject_id,
    day,
    morning,
    noon,
    night,
    created_at,
    updated_at
FROM attendance";

/// Bound parameters per `IN (...)` chunk, kept well below SQLite limits.
const DATE_SET_CHUNK: usize = 400;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for attendance and roster persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Transport/storage failure; retryable by the caller.
    Db(DbError),
    /// Caller input rejected before reaching storage.
    InvalidInput(String),
    /// `start` is after `end` in a range query.
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// Persisted row cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::InvalidRange { start, end } => {
                write!(f, "range start {start} is after end {end}")
            }
            Self::InvalidData(message) => {
                write!(f, "invalid persisted attendance data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidInput(_) => None,
            Self::InvalidRange { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// How an upsert reached the persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed; a new one was created.
    Inserted,
    /// A row already existed (or won a concurrent insert); meals replaced.
    Replaced,
}

/// Persisted record plus the path the upsert took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub record: AttendanceRecord,
    pub outcome: UpsertOutcome,
}

/// Repository interface for attendance records.
pub trait AttendanceRepository {
    /// Creates or replaces the meals for `(subject_id, day)`.
    fn upsert(&self, subject_id: &str, day: NaiveDate, meals: Meals) -> RepoResult<Upserted>;
    /// Loads one record by key.
    fn get(&self, subject_id: &str, day: NaiveDate) -> RepoResult<Option<AttendanceRecord>>;
    /// Records of one subject within one calendar month.
    fn query_by_month(
        &self,
        subject_id: &str,
        month: YearMonth,
    ) -> RepoResult<Vec<AttendanceRecord>>;
    /// Records of any subject whose day is in `days`.
    fn query_by_date_set(&self, days: &BTreeSet<NaiveDate>) -> RepoResult<Vec<AttendanceRecord>>;
    /// Records of any subject with `start <= day <= end`.
    fn query_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<AttendanceRecord>>;
}

/// SQLite-backed attendance repository.
///
/// Borrows a connection owned by the current execution context. Concurrent
/// contexts each hold their own connection to the same database file.
pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn upsert(&self, subject_id: &str, day: NaiveDate, meals: Meals) -> RepoResult<Upserted> {
        if subject_id.trim().is_empty() {
            return Err(RepoError::InvalidInput(
                "subject_id cannot be empty".to_string(),
            ));
        }
        let day_text = format_day(day);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let outcome = match insert_row(&tx, subject_id, &day_text, meals) {
            Ok(()) => UpsertOutcome::Inserted,
            Err(err) if is_key_conflict(&err) => {
                debug!(
                    "event=attendance_upsert module=repo status=conflict subject={} day={}",
                    log_field(subject_id),
                    day_text
                );
                let changed = replace_meals(&tx, subject_id, &day_text, meals)?;
                if changed == 0 {
                    // The conflict was not on the (subject, day) key.
                    return Err(err.into());
                }
                UpsertOutcome::Replaced
            }
            Err(err) => return Err(err.into()),
        };

        let record = load_record(&tx, subject_id, &day_text)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "record ({subject_id}, {day_text}) missing after upsert"
            ))
        })?;
        tx.commit()?;

        info!(
            "event=attendance_upsert module=repo status=ok outcome={} subject={} day={}",
            match outcome {
                UpsertOutcome::Inserted => "inserted",
                UpsertOutcome::Replaced => "replaced",
            },
            log_field(subject_id),
            day_text
        );
        Ok(Upserted { record, outcome })
    }

    fn get(&self, subject_id: &str, day: NaiveDate) -> RepoResult<Option<AttendanceRecord>> {
        load_record(self.conn, subject_id, &format_day(day))
    }

    fn query_by_month(
        &self,
        subject_id: &str,
        month: YearMonth,
    ) -> RepoResult<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTENDANCE_SELECT_SQL}
             WHERE subject_id = ?1
               AND day >= ?2
               AND day <= ?3
             ORDER BY day ASC;"
        ))?;
        let mut rows = stmt.query(params![
            subject_id,
            format_day(month.first_day()),
            format_day(month.last_day()),
        ])?;
        collect_records(&mut rows)
    }

    fn query_by_date_set(&self, days: &BTreeSet<NaiveDate>) -> RepoResult<Vec<AttendanceRecord>> {
        let days = days.iter().copied().collect::<Vec<_>>();
        let mut records = Vec::new();

        for chunk in days.chunks(DATE_SET_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "{ATTENDANCE_SELECT_SQL}
                 WHERE day IN ({placeholders})
                 ORDER BY day ASC, subject_id ASC;"
            );
            let bind_values = chunk
                .iter()
                .map(|day| Value::Text(format_day(*day)))
                .collect::<Vec<_>>();

            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            records.extend(collect_records(&mut rows)?);
        }

        Ok(records)
    }

    fn query_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<AttendanceRecord>> {
        if start > end {
            return Err(RepoError::InvalidRange { start, end });
        }

        let mut stmt = self.conn.prepare(&format!(
            "{ATTENDANCE_SELECT_SQL}
             WHERE day >= ?1
               AND day <= ?2
             ORDER BY day ASC, subject_id ASC;"
        ))?;
        let mut rows = stmt.query(params![format_day(start), format_day(end)])?;
        collect_records(&mut rows)
    }
}

fn insert_row(
    conn: &Connection,
    subject_id: &str,
    day_text: &str,
    meals: Meals,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO attendance (
            subject_id,
            day,
            record_uuid,
            morning,
            noon,
            night
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            subject_id,
            day_text,
            Uuid::new_v4().to_string(),
            bool_to_int(meals.morning),
            bool_to_int(meals.noon),
            bool_to_int(meals.night),
        ],
    )?;
    Ok(())
}

fn replace_meals(
    conn: &Connection,
    subject_id: &str,
    day_text: &str,
    meals: Meals,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE attendance
         SET
            morning = ?3,
            noon = ?4,
            night = ?5,
            updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
         WHERE subject_id = ?1
           AND day = ?2;",
        params![
            subject_id,
            day_text,
            bool_to_int(meals.morning),
            bool_to_int(meals.noon),
            bool_to_int(meals.night),
        ],
    )
}

fn load_record(
    conn: &Connection,
    subject_id: &str,
    day_text: &str,
) -> RepoResult<Option<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{ATTENDANCE_SELECT_SQL}
         WHERE subject_id = ?1
           AND day = ?2;"
    ))?;
    let mut rows = stmt.query(params![subject_id, day_text])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_record_row(row)?));
    }
    Ok(None)
}

fn collect_records(rows: &mut rusqlite::Rows<'_>) -> RepoResult<Vec<AttendanceRecord>> {
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_record_row(row)?);
    }
    Ok(records)
}

fn is_key_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(inner, _) => {
            inner.code == ErrorCode::ConstraintViolation
                && (inner.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || inner.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    let uuid_text: String = row.get("record_uuid")?;
    let record_id: RecordId = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in attendance.record_uuid"
        ))
    })?;

    let day_text: String = row.get("day")?;
    let day = parse_day(&day_text).map_err(|err| {
        RepoError::InvalidData(format!("{err} in attendance.day"))
    })?;

    Ok(AttendanceRecord {
        record_id,
        subject_id: row.get("subject_id")?,
        day,
        meals: Meals {
            morning: parse_flag(row, "morning")?,
            noon: parse_flag(row, "noon")?,
            night: parse_flag(row, "night")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_flag(row: &Row<'_>, column: &'static str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in attendance.{column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
