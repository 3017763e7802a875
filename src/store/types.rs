//! Core data types for the record store.
//!
//! - [`Employee`]: A stored employee record including its derived performance score
//! - [`EmployeeDraft`]: Caller-supplied fields for create and update
//! - [`Department`]: Organisational unit an employee belongs to
//! - [`StoreLimits`]: Validation bounds applied at the store boundary

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Employee identifier.
///
/// Signed so that malformed input from callers (zero, negatives) reaches the
/// store and is rejected there as an invalid argument.
pub type EmployeeId = i64;

/// Lowest possible performance rating.
pub const MIN_RATING: f64 = 0.0;

/// Highest possible performance rating.
pub const MAX_RATING: f64 = 5.0;

/// Default minimum compensation accepted by the store.
pub const DEFAULT_MIN_COMPENSATION: f64 = 20_000.0;

/// Default maximum compensation accepted by the store.
pub const DEFAULT_MAX_COMPENSATION: f64 = 2_000_000.0;

/// Days per year used for experience.
const DAYS_PER_YEAR: f64 = 365.0;

/// Organisational unit of an employee.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Department {
    Hr,
    Engineering,
    Finance,
    Marketing,
    Operations,
}

/// An employee record as held by the store.
///
/// Values handed out by the store are always independent copies; mutating one
/// never affects stored state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier, fixed at creation.
    pub id: EmployeeId,
    /// Display name.
    pub name: String,
    /// Job position, the aggregation key.
    pub position: String,
    /// Compensation within the configured bounds.
    pub compensation: f64,
    /// Mean of all submitted ratings, 0 until the first rating.
    pub performance: f64,
    #[serde(default)]
    pub department: Option<Department>,
    /// Date the employee joined, never in the future.
    #[serde(default)]
    pub join_date: Option<NaiveDate>,
    /// Time of the last mutation (UTC).
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Build a fresh record from a draft with no ratings yet.
    pub(crate) fn from_draft(draft: EmployeeDraft) -> Self {
        Self {
            id: draft.id,
            name: draft.name,
            position: draft.position,
            compensation: draft.compensation,
            performance: 0.0,
            department: draft.department,
            join_date: draft.join_date,
            updated_at: Utc::now(),
        }
    }

    /// Years of service as of `today`, if the join date is known.
    pub fn experience_years(&self, today: NaiveDate) -> Option<f64> {
        self.join_date
            .map(|joined| (today - joined).num_days() as f64 / DAYS_PER_YEAR)
    }
}

/// Caller-supplied employee fields.
///
/// The store owns the derived fields (performance, timestamps); callers
/// provide everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub id: EmployeeId,
    pub name: String,
    pub position: String,
    pub compensation: f64,
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub join_date: Option<NaiveDate>,
}

impl EmployeeDraft {
    pub fn new(
        id: EmployeeId,
        name: impl Into<String>,
        position: impl Into<String>,
        compensation: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            position: position.into(),
            compensation,
            department: None,
            join_date: None,
        }
    }

    pub fn with_department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }

    pub fn with_join_date(mut self, join_date: NaiveDate) -> Self {
        self.join_date = Some(join_date);
        self
    }

    /// Strip surrounding whitespace from name and position, which are stored
    /// and aggregated in this form.
    pub fn normalized(mut self) -> Self {
        if self.name.trim().len() != self.name.len() {
            self.name = self.name.trim().to_owned();
        }
        if self.position.trim().len() != self.position.len() {
            self.position = self.position.trim().to_owned();
        }
        self
    }
}

impl From<&Employee> for EmployeeDraft {
    fn from(e: &Employee) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            position: e.position.clone(),
            compensation: e.compensation,
            department: e.department,
            join_date: e.join_date,
        }
    }
}

/// Validation bounds and capabilities of a record store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreLimits {
    /// Smallest accepted identifier (always at least 1).
    pub min_id: EmployeeId,
    /// Inclusive lower compensation bound.
    pub min_compensation: f64,
    /// Inclusive upper compensation bound.
    pub max_compensation: f64,
    /// Whether records may be removed.
    pub allow_removal: bool,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            min_id: 1,
            min_compensation: DEFAULT_MIN_COMPENSATION,
            max_compensation: DEFAULT_MAX_COMPENSATION,
            allow_removal: true,
        }
    }
}
