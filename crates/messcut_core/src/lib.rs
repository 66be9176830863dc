//! Core domain logic for mess attendance tracking.
//! This crate is the single source of truth for marking rules and
//! mess-cut aggregation.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError, PolicyConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::attendance::{
    effective_meals, AttendanceRecord, DayAttendance, Meals, RecordId, SubjectId,
};
pub use model::day::{format_day, parse_day, DayParseError, YearMonth};
pub use model::subject::Subject;
pub use policy::window::{WindowPolicy, WindowViolation};
pub use repo::attendance_repo::{
    AttendanceRepository, RepoError, RepoResult, SqliteAttendanceRepository, UpsertOutcome,
    Upserted,
};
pub use repo::roster_repo::{RosterProvider, SqliteRosterRepository, StaticRoster};
pub use service::attendance_service::{AttendanceError, AttendanceService};
pub use service::report_service::{
    summarize_cuts, summarize_day, CutDetail, CutReport, CutSummaryRow, DailyDetail,
    DailySummary, MealCounts, ReportError, ReportService,
};
