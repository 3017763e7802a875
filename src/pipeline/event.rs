//! Change events flowing from writers to the aggregation consumer.

use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::store::{Employee, EmployeeId};

/// What happened to the record behind a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
    Rated,
}

/// A record changed and the statistics of `position` need recomputing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Employee whose write produced the event.
    pub employee_id: EmployeeId,
    /// Position whose statistics are affected.
    pub position: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(employee_id: EmployeeId, position: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            employee_id,
            position: position.into(),
            kind,
        }
    }

    pub(crate) fn for_employee(employee: &Employee, kind: ChangeKind) -> Self {
        Self::new(employee.id, employee.position.clone(), kind)
    }
}
