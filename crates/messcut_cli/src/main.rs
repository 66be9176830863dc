//! Operator CLI over the attendance core.
//!
//! # Responsibility
//! - Map subcommands onto core use-cases and print JSON results.
//! - Read the wall clock once, at this boundary, for `mark` and `window`.
//!
//! Errors go to stderr with exit code 1.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use messcut_core::db::open_db;
use messcut_core::{
    init_from_config, AppConfig, AttendanceService, Meals, ReportService,
    SqliteAttendanceRepository, SqliteRosterRepository, Subject,
};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "messcut", about = "Mess attendance and cut reports", version)]
struct Cli {
    /// Path to messcut.toml
    #[arg(long, global = true, default_value = "messcut.toml")]
    config: PathBuf,

    /// Override the database path from config
    #[arg(long, global = true, env = "MESSCUT_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark meals for one day (all meals on unless switched off)
    Mark {
        subject: String,
        /// Day as YYYY-MM-DD
        day: String,
        #[command(flatten)]
        skip: SkipMeals,
    },

    /// Show one subject's month
    Month {
        subject: String,
        /// Month as YYYY-MM
        month: String,
        /// Include unmarked days as fully present
        #[arg(long)]
        fill: bool,
    },

    /// Per-meal absence summary for one day
    Summary { day: String },

    /// Mess-cut report for explicit days
    Cuts {
        #[arg(required = true)]
        days: Vec<String>,
    },

    /// Mess-cut report for an inclusive range of days
    CutsRange { start: String, end: String },

    /// Days currently open for marking
    Window,

    /// Manage the local roster
    Roster {
        #[command(subcommand)]
        command: RosterCommands,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct SkipMeals {
    /// Skip the morning meal
    #[arg(long)]
    no_morning: bool,
    /// Skip the noon meal
    #[arg(long)]
    no_noon: bool,
    /// Skip the night meal
    #[arg(long)]
    no_night: bool,
    /// Skip every meal (mess cut)
    #[arg(long, conflicts_with_all = ["no_morning", "no_noon", "no_night"])]
    cut: bool,
}

impl SkipMeals {
    fn meals(&self) -> Meals {
        if self.cut {
            return Meals::CUT;
        }
        Meals::new(!self.no_morning, !self.no_noon, !self.no_night)
    }
}

#[derive(Subcommand)]
enum RosterCommands {
    /// Add or update a subject
    Add {
        subject: String,
        name: String,
        #[arg(long)]
        room: Option<String>,
        /// Keep this subject out of reports (e.g. staff)
        #[arg(long)]
        unreportable: bool,
    },
    /// List subjects
    List {
        #[arg(long)]
        all: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    init_from_config(&config)?;

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let policy = config.window_policy()?;
    let conn = open_db(&config.database_path)?;

    match cli.command {
        Commands::Mark { subject, day, skip } => {
            let service = AttendanceService::new(SqliteAttendanceRepository::new(&conn), policy);
            print_json(&service.mark(&subject, &day, skip.meals(), Utc::now())?)
        }
        Commands::Month {
            subject,
            month,
            fill,
        } => {
            let service = AttendanceService::new(SqliteAttendanceRepository::new(&conn), policy);
            if fill {
                print_json(&service.month_view(&subject, &month)?)
            } else {
                print_json(&service.get_month(&subject, &month)?)
            }
        }
        Commands::Summary { day } => {
            let service = ReportService::new(
                SqliteAttendanceRepository::new(&conn),
                SqliteRosterRepository::new(&conn),
            );
            print_json(&service.daily_summary(&day)?)
        }
        Commands::Cuts { days } => {
            let service = ReportService::new(
                SqliteAttendanceRepository::new(&conn),
                SqliteRosterRepository::new(&conn),
            );
            print_json(&service.range_cut_report(days.as_slice())?)
        }
        Commands::CutsRange { start, end } => {
            let service = ReportService::new(
                SqliteAttendanceRepository::new(&conn),
                SqliteRosterRepository::new(&conn),
            );
            print_json(&service.range_cut_report_between(&start, &end)?)
        }
        Commands::Window => print_json(&policy.markable_days(Utc::now())),
        Commands::Roster { command } => {
            let roster = SqliteRosterRepository::new(&conn);
            match command {
                RosterCommands::Add {
                    subject,
                    name,
                    room,
                    unreportable,
                } => {
                    let mut entry = Subject::new(subject, name);
                    entry.room = room;
                    entry.is_reportable = !unreportable;
                    roster.upsert_subject(&entry)?;
                    print_json(&entry)
                }
                RosterCommands::List { all } => print_json(&roster.list_subjects(all)?),
            }
        }
        Commands::Config => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
