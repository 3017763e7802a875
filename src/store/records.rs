//! In-memory record store guarded by a single reader/writer lock.
//!
//! The record map, the rating histories and the id counter live together in
//! [`Tables`] behind one `RwLock`, so a rating append and the recomputed mean
//! become visible atomically. Every value crossing the API is an owned copy.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::store::StoreError;
use crate::store::types::{Employee, EmployeeDraft, EmployeeId, StoreLimits};
use crate::store::validation::{validate_draft, validate_rating};

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated {
    /// Record as it was before the update.
    pub previous: Employee,
    /// Record as stored now.
    pub current: Employee,
}

impl Updated {
    /// Whether the update moved the employee to another position.
    pub fn position_changed(&self) -> bool {
        self.previous.position != self.current.position
    }
}

#[derive(Debug, Default)]
struct Tables {
    employees: HashMap<EmployeeId, Employee>,
    history: HashMap<EmployeeId, Vec<f64>>,
    /// Highest id ever stored; system-assigned ids continue above it.
    high_water: EmployeeId,
}

/// Concurrent employee record store.
#[derive(Debug)]
pub struct RecordStore {
    tables: RwLock<Tables>,
    limits: StoreLimits,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

impl RecordStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            limits,
        }
    }

    pub fn limits(&self) -> &StoreLimits {
        &self.limits
    }

    // A panic in another writer must not wedge the store; the tables are
    // only ever mutated after validation, so they stay consistent.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert a new employee with a caller-chosen id.
    ///
    /// Name and position are stored trimmed.
    pub fn create(&self, draft: EmployeeDraft) -> Result<Employee, StoreError> {
        let draft = draft.normalized();
        validate_draft(&draft, &self.limits)?;

        let mut tables = self.write();
        if tables.employees.contains_key(&draft.id) {
            return Err(StoreError::AlreadyExists(draft.id));
        }
        Ok(tables.insert(Employee::from_draft(draft)))
    }

    /// Insert a new employee under the next free system-assigned id.
    ///
    /// The id carried by the draft is ignored. Assigned ids are never reused,
    /// even after the record holding them has been removed.
    pub fn create_assigned(&self, draft: EmployeeDraft) -> Result<Employee, StoreError> {
        let mut draft = draft.normalized();
        // Validate with a placeholder id so field errors surface before the
        // counter is touched.
        draft.id = self.limits.min_id.max(1);
        validate_draft(&draft, &self.limits)?;

        let mut tables = self.write();
        let floor = self.limits.min_id.max(1);
        let mut next = if tables.high_water < floor {
            floor
        } else {
            tables.high_water.checked_add(1).ok_or_else(ids_exhausted)?
        };
        while tables.employees.contains_key(&next) {
            next = next.checked_add(1).ok_or_else(ids_exhausted)?;
        }
        draft.id = next;
        Ok(tables.insert(Employee::from_draft(draft)))
    }

    /// Replace the caller-supplied fields of an existing employee.
    ///
    /// The rating history and derived performance score are preserved.
    pub fn update(&self, draft: EmployeeDraft) -> Result<Updated, StoreError> {
        let draft = draft.normalized();
        validate_draft(&draft, &self.limits)?;

        let mut tables = self.write();
        let stored = tables
            .employees
            .get_mut(&draft.id)
            .ok_or(StoreError::NotFound(draft.id))?;

        let previous = stored.clone();
        stored.name = draft.name;
        stored.position = draft.position;
        stored.compensation = draft.compensation;
        stored.department = draft.department;
        stored.join_date = draft.join_date;
        stored.updated_at = Utc::now();

        Ok(Updated {
            previous,
            current: stored.clone(),
        })
    }

    /// Remove an employee and its rating history.
    pub fn remove(&self, id: EmployeeId) -> Result<Employee, StoreError> {
        if !self.limits.allow_removal {
            return Err(StoreError::Unsupported("remove"));
        }

        let mut tables = self.write();
        let removed = tables
            .employees
            .remove(&id)
            .ok_or(StoreError::NotFound(id))?;
        tables.history.remove(&id);
        Ok(removed)
    }

    /// Append a rating and recompute the mean performance score.
    pub fn record_performance_rating(
        &self,
        id: EmployeeId,
        rating: f64,
    ) -> Result<Employee, StoreError> {
        validate_rating(rating)?;

        let mut tables = self.write();
        let Tables {
            employees, history, ..
        } = &mut *tables;

        let stored = employees.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let ratings = history.entry(id).or_default();
        ratings.push(rating);

        stored.performance = ratings.iter().sum::<f64>() / ratings.len() as f64;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, id: EmployeeId) -> Result<Employee, StoreError> {
        self.read()
            .employees
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Snapshot of all records in unspecified order.
    pub fn list(&self) -> Vec<Employee> {
        self.read().employees.values().cloned().collect()
    }

    /// Snapshot of the records matching `predicate`.
    ///
    /// The predicate runs while the shared lock is held and must not call
    /// back into the store.
    pub fn filter<F>(&self, predicate: F) -> Vec<Employee>
    where
        F: Fn(&Employee) -> bool,
    {
        self.read()
            .employees
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Copy of the rating history of an employee, oldest first.
    pub fn history(&self, id: EmployeeId) -> Result<Vec<f64>, StoreError> {
        let tables = self.read();
        if !tables.employees.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        Ok(tables.history.get(&id).cloned().unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.read().employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ids_exhausted() -> StoreError {
    StoreError::invalid("id", "no identifier left above the highest one ever stored")
}

impl Tables {
    fn insert(&mut self, employee: Employee) -> Employee {
        let id = employee.id;
        self.high_water = self.high_water.max(id);
        self.history.insert(id, Vec::new());
        self.employees.insert(id, employee.clone());
        employee
    }
}
