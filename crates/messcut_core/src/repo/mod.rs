//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Day values reach storage only as validated `NaiveDate`s.
//! - Repository APIs return semantic errors (`InvalidRange`, `InvalidData`)
//!   in addition to DB transport errors.

pub mod attendance_repo;
pub mod roster_repo;
