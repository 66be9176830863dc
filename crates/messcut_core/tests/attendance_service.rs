use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use messcut_core::db::{open_db, open_db_in_memory};
use messcut_core::{
    AttendanceError, AttendanceRepository, AttendanceService, Meals, SqliteAttendanceRepository,
    WindowPolicy,
};
use rusqlite::Connection;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn count_rows(conn: &rusqlite::Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM attendance;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn mark_twice_keeps_last_write() {
    let conn = open_db_in_memory().unwrap();
    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());
    let now = at(2025, 3, 8, 10, 0);

    service
        .mark("s-1", "2025-03-10", Meals::new(false, true, true), now)
        .unwrap();
    let second = service
        .mark("s-1", "2025-03-10", Meals::new(true, false, false), now)
        .unwrap();

    assert_eq!(second.meals, Meals::new(true, false, false));
    let stored = SqliteAttendanceRepository::new(&conn)
        .get("s-1", day(2025, 3, 10))
        .unwrap()
        .unwrap();
    assert_eq!(stored.meals, Meals::new(true, false, false));
    assert_eq!(count_rows(&conn), 1);
}

#[test]
fn repeating_identical_mark_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());
    let now = at(2025, 3, 8, 10, 0);

    let first = service.mark("s-1", "2025-03-10", Meals::CUT, now).unwrap();
    let again = service.mark("s-1", "2025-03-10", Meals::CUT, now).unwrap();
    assert_eq!(first.record_id, again.record_id);
    assert_eq!(first.meals, again.meals);
    assert_eq!(count_rows(&conn), 1);
}

#[test]
fn mark_beyond_horizon_is_rejected_without_side_effects() {
    let conn = open_db_in_memory().unwrap();
    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());
    let now = at(2025, 3, 8, 10, 0);

    for meals in [Meals::CUT, Meals::PRESENT, Meals::new(true, false, true)] {
        let err = service.mark("s-1", "2025-03-16", meals, now).unwrap_err();
        assert!(
            matches!(err, AttendanceError::TooFarInAdvance { horizon_days: 7, .. }),
            "{err}"
        );
        assert_eq!(err.code(), "too-far-advance");
    }
    service.mark("s-1", "2025-03-15", Meals::CUT, now).unwrap();
    assert_eq!(count_rows(&conn), 1);
}

#[test]
fn mark_after_deadline_is_rejected_and_names_day() {
    let conn = open_db_in_memory().unwrap();
    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());

    let err = service
        .mark("s-1", "2025-03-10", Meals::CUT, at(2025, 3, 9, 19, 1))
        .unwrap_err();
    match &err {
        AttendanceError::DeadlinePassed { day: target, deadline } => {
            assert_eq!(*target, day(2025, 3, 10));
            assert_eq!(*deadline, at(2025, 3, 9, 19, 0));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("2025-03-10"));
    assert!(!err.is_retryable());

    let past = service
        .mark("s-1", "2025-03-01", Meals::CUT, at(2025, 3, 9, 8, 0))
        .unwrap_err();
    assert!(matches!(past, AttendanceError::DeadlinePassed { .. }));
    assert_eq!(count_rows(&conn), 0);
}

#[test]
fn configured_cutoff_moves_the_deadline() {
    let conn = open_db_in_memory().unwrap();
    let policy = WindowPolicy::new(NaiveTime::from_hms_opt(21, 30, 0).unwrap(), 7);
    let service = AttendanceService::new(SqliteAttendanceRepository::new(&conn), policy);

    service
        .mark("s-1", "2025-03-10", Meals::CUT, at(2025, 3, 9, 21, 0))
        .unwrap();
}

#[test]
fn malformed_day_is_rejected_before_policy() {
    let conn = open_db_in_memory().unwrap();
    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());
    let now = at(2025, 3, 8, 10, 0);

    for input in ["10-03-2025", "2025-02-30", "", "2025-03-10 "] {
        let err = service.mark("s-1", input, Meals::CUT, now).unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidFormat(_)), "{input}");
        assert_eq!(err.code(), "invalid-format");
    }

    let err = service.mark("", "2025-03-10", Meals::CUT, now).unwrap_err();
    assert!(matches!(err, AttendanceError::MissingSubject));
    assert_eq!(count_rows(&conn), 0);
}

#[test]
fn get_month_returns_only_marked_days() {
    let conn = open_db_in_memory().unwrap();
    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());
    let now = at(2025, 3, 8, 10, 0);

    service.mark("s-1", "2025-03-10", Meals::CUT, now).unwrap();
    service
        .mark("s-1", "2025-03-12", Meals::new(true, false, true), now)
        .unwrap();
    service.mark("s-2", "2025-03-11", Meals::CUT, now).unwrap();

    let records = service.get_month("s-1", "2025-03").unwrap();
    let days = records.iter().map(|record| record.day).collect::<Vec<_>>();
    assert_eq!(days, vec![day(2025, 3, 10), day(2025, 3, 12)]);

    assert!(service.get_month("s-1", "2025-04").unwrap().is_empty());
    assert!(matches!(
        service.get_month("s-1", "2025/03"),
        Err(AttendanceError::InvalidFormat(_))
    ));
}

#[test]
fn month_view_fills_gaps_with_present_meals() {
    let conn = open_db_in_memory().unwrap();
    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());
    service
        .mark("s-1", "2025-03-10", Meals::CUT, at(2025, 3, 8, 10, 0))
        .unwrap();

    let view = service.month_view("s-1", "2025-03").unwrap();
    assert_eq!(view.len(), 31);
    let explicit = view.iter().filter(|entry| entry.explicit).collect::<Vec<_>>();
    assert_eq!(explicit.len(), 1);
    assert_eq!(explicit[0].day, day(2025, 3, 10));
    assert_eq!(explicit[0].meals, Meals::CUT);
    assert!(view
        .iter()
        .filter(|entry| !entry.explicit)
        .all(|entry| entry.meals == Meals::PRESENT));
}

#[test]
fn markable_days_come_from_the_service_policy() {
    let conn = open_db_in_memory().unwrap();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::new(&conn),
        WindowPolicy::new(NaiveTime::from_hms_opt(19, 0, 0).unwrap(), 3),
    );

    let days = service.markable_days(at(2025, 3, 8, 10, 0));
    assert_eq!(days, vec![day(2025, 3, 9), day(2025, 3, 10), day(2025, 3, 11)]);
}

#[test]
fn simultaneous_marks_for_new_key_both_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service-race.db");
    drop(open_db(&path).unwrap());

    let barrier = Arc::new(Barrier::new(2));
    let now = at(2025, 3, 8, 10, 0);
    let handles = [Meals::CUT, Meals::new(true, false, false)]
        .into_iter()
        .map(|meals| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = AttendanceService::new(
                    SqliteAttendanceRepository::new(&conn),
                    WindowPolicy::default(),
                );
                barrier.wait();
                service
                    .mark("s-1", "2025-03-10", meals, now)
                    .map(|record| record.record_id)
                    .map_err(|err| err.to_string())
            })
        })
        .collect::<Vec<_>>();

    let ids = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(ids[0], ids[1]);

    let conn = open_db(&path).unwrap();
    assert_eq!(count_rows(&conn), 1);
}

#[test]
fn locked_store_surfaces_retryable_transient_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let conn = open_db(&path).unwrap();
    conn.busy_timeout(Duration::from_millis(50)).unwrap();

    let holder = Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());
    let err = service
        .mark("s-1", "2025-03-10", Meals::CUT, at(2025, 3, 8, 10, 0))
        .unwrap_err();
    assert!(matches!(err, AttendanceError::Transient(_)), "{err}");
    assert_eq!(err.code(), "transient");
    assert!(err.is_retryable());

    holder.execute_batch("ROLLBACK;").unwrap();
    assert!(service.get_month("s-1", "2025-03").unwrap().is_empty());

    service
        .mark("s-1", "2025-03-10", Meals::CUT, at(2025, 3, 8, 10, 0))
        .unwrap();
    assert_eq!(service.get_month("s-1", "2025-03").unwrap().len(), 1);
}

#[test]
fn malformed_stored_row_is_not_retryable() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO attendance (subject_id, day, record_uuid) VALUES ('s-1', '2025-03-10', 'not-a-uuid');",
        [],
    )
    .unwrap();

    let service =
        AttendanceService::new(SqliteAttendanceRepository::new(&conn), WindowPolicy::default());
    let err = service.get_month("s-1", "2025-03").unwrap_err();
    assert!(matches!(err, AttendanceError::Storage(_)), "{err}");
    assert_eq!(err.code(), "invalid-data");
    assert!(!err.is_retryable());
}
