//! Record Store
//!
//! Exclusive source of truth for employee records:
//! - **Writes**: create, update, remove and rating appends under an exclusive lock
//! - **Reads**: get, list and filter under a shared lock, always returning copies
//!
//! # Components
//!
//! - [`RecordStore`]: Lock-guarded record and rating-history tables
//! - [`Employee`] / [`EmployeeDraft`]: Stored record and caller input
//! - [`Department`]: Organisational unit of an employee
//! - [`StoreLimits`]: Validation bounds
//! - [`StoreError`]: Error taxonomy of the store boundary

mod error;
mod records;
mod types;
pub mod validation;

pub use error::{BatchError, StoreError};
pub use records::{RecordStore, Updated};
pub use types::{
    DEFAULT_MAX_COMPENSATION, DEFAULT_MIN_COMPENSATION, Department, Employee, EmployeeDraft,
    EmployeeId, MAX_RATING, MIN_RATING, StoreLimits,
};
