//! Roster provider contracts and implementations.
//!
//! # Responsibility
//! - Supply the list of subjects eligible for aggregation reports.
//! - Keep a local SQLite roster for deployments without an external one.
//!
//! # Invariants
//! - Only `is_reportable` subjects are returned by `reportable_subjects`.
//! - SQLite roster order is `display_name ASC, subject_id ASC`.
//! - `StaticRoster` preserves caller order.

use crate::model::subject::Subject;
use crate::repo::attendance_repo::{bool_to_int, RepoError, RepoResult};
use log::info;
use rusqlite::{params, Connection, Row};

/// Source of reportable subjects for aggregation.
pub trait RosterProvider {
    fn reportable_subjects(&self) -> RepoResult<Vec<Subject>>;
}

/// Fixed in-memory roster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticRoster {
    subjects: Vec<Subject>,
}

impl StaticRoster {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self { subjects }
    }
}

impl RosterProvider for StaticRoster {
    fn reportable_subjects(&self) -> RepoResult<Vec<Subject>> {
        Ok(self
            .subjects
            .iter()
            .filter(|subject| subject.is_reportable)
            .cloned()
            .collect())
    }
}

impl<P: RosterProvider + ?Sized> RosterProvider for &P {
    fn reportable_subjects(&self) -> RepoResult<Vec<Subject>> {
        (**self).reportable_subjects()
    }
}

/// SQLite-backed roster.
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates or replaces one subject row.
    pub fn upsert_subject(&self, subject: &Subject) -> RepoResult<()> {
        if subject.subject_id.trim().is_empty() {
            return Err(RepoError::InvalidInput(
                "subject_id cannot be empty".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO subjects (subject_id, display_name, room, is_reportable)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (subject_id) DO UPDATE SET
                display_name = excluded.display_name,
                room = excluded.room,
                is_reportable = excluded.is_reportable;",
            params![
                subject.subject_id.as_str(),
                subject.display_name.as_str(),
                subject.room.as_deref(),
                bool_to_int(subject.is_reportable),
            ],
        )?;
        info!(
            "event=roster_upsert module=repo status=ok reportable={}",
            subject.is_reportable
        );
        Ok(())
    }

    /// Loads one subject by id.
    pub fn get_subject(&self, subject_id: &str) -> RepoResult<Option<Subject>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject_id, display_name, room, is_reportable
             FROM subjects
             WHERE subject_id = ?1;",
        )?;
        let mut rows = stmt.query([subject_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_subject_row(row)?));
        }
        Ok(None)
    }

    /// Lists subjects, optionally including non-reportable ones.
    pub fn list_subjects(&self, include_unreportable: bool) -> RepoResult<Vec<Subject>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject_id, display_name, room, is_reportable
             FROM subjects
             WHERE (?1 = 1 OR is_reportable = 1)
             ORDER BY display_name ASC, subject_id ASC;",
        )?;
        let mut rows = stmt.query([bool_to_int(include_unreportable)])?;
        let mut subjects = Vec::new();
        while let Some(row) = rows.next()? {
            subjects.push(parse_subject_row(row)?);
        }
        Ok(subjects)
    }
}

impl RosterProvider for SqliteRosterRepository<'_> {
    fn reportable_subjects(&self) -> RepoResult<Vec<Subject>> {
        self.list_subjects(false)
    }
}

fn parse_subject_row(row: &Row<'_>) -> RepoResult<Subject> {
    let is_reportable = match row.get::<_, i64>("is_reportable")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_reportable value `{other}` in subjects.is_reportable"
            )));
        }
    };

    Ok(Subject {
        subject_id: row.get("subject_id")?,
        display_name: row.get("display_name")?,
        room: row.get("room")?,
        is_reportable,
    })
}
