//! Domain model for daily meal attendance.
//!
//! # Responsibility
//! - Define the canonical attendance record and its meal flags.
//! - Own the civil-date grammar every entry point validates against.
//!
//! # Invariants
//! - One record per `(subject_id, day)`; days carry no time or zone.
//! - "Mess cut" is derived from meal flags, never stored.
//! - A missing record means fully present (all meals `true`).

pub mod attendance;
pub mod day;
pub mod subject;
