//! Attendance record domain model.
//!
//! # Responsibility
//! - Define the per-day meal flags and the persisted attendance record.
//! - Provide the single default-merge step for days without a record.
//!
//! # Invariants
//! - `(subject_id, day)` identifies at most one record.
//! - `record_id` is assigned on first insert and never changes.
//! - Meal flags are independent; `true` means "will eat".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque subject identifier owned by the identity collaborator.
pub type SubjectId = String;

/// Stable identifier of a persisted attendance row.
pub type RecordId = Uuid;

/// Meal participation flags for one subject and one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meals {
    pub morning: bool,
    pub noon: bool,
    pub night: bool,
}

impl Meals {
    /// Fully present: the value of every day without a record.
    pub const PRESENT: Meals = Meals {
        morning: true,
        noon: true,
        night: true,
    };

    /// Opted out of every meal.
    pub const CUT: Meals = Meals {
        morning: false,
        noon: false,
        night: false,
    };

    pub fn new(morning: bool, noon: bool, night: bool) -> Self {
        Self {
            morning,
            noon,
            night,
        }
    }

    /// Returns whether this day counts as a mess cut.
    pub fn is_cut(&self) -> bool {
        !self.morning && !self.noon && !self.night
    }
}

impl Default for Meals {
    fn default() -> Self {
        Self::PRESENT
    }
}

/// Persisted attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub record_id: RecordId,
    pub subject_id: SubjectId,
    /// Civil date, serialized as `YYYY-MM-DD`.
    pub day: NaiveDate,
    pub meals: Meals,
    /// Epoch milliseconds, set by the store on insert.
    pub created_at: i64,
    /// Epoch milliseconds, refreshed by the store on every write.
    pub updated_at: i64,
}

impl AttendanceRecord {
    pub fn is_cut(&self) -> bool {
        self.meals.is_cut()
    }
}

/// Resolves the meals in effect for a day, applying the fully-present default.
///
/// Every read path that needs per-day meals goes through this function
/// instead of coalescing missing rows locally.
pub fn effective_meals(record: Option<&AttendanceRecord>) -> Meals {
    record.map_or(Meals::PRESENT, |record| record.meals)
}

/// One day of a subject's calendar after the default merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAttendance {
    pub day: NaiveDate,
    pub meals: Meals,
    /// `true` when the meals come from a stored record.
    pub explicit: bool,
}
