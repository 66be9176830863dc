//! Roster subject model.

use serde::{Deserialize, Serialize};

use super::attendance::SubjectId;

/// A resident known to the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub subject_id: SubjectId,
    pub display_name: String,
    pub room: Option<String>,
    /// Only reportable subjects appear in aggregation output.
    pub is_reportable: bool,
}

impl Subject {
    /// Creates a reportable subject without room assignment.
    pub fn new(subject_id: impl Into<SubjectId>, display_name: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            display_name: display_name.into(),
            room: None,
            is_reportable: true,
        }
    }
}
