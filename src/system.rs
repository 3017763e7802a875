//! System builder and handle.
//!
//! [`SystemBuilder`] constructs the record store and spawns the aggregation
//! pipeline; [`EmployeeSystem`] is the handle callers use for every store
//! operation and for shutdown.
//!
//! Each mutating call commits under the store's exclusive lock, releases it,
//! and only then publishes its change events. A publish that fails under the
//! configured backpressure policy never changes the call's result.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::config::AppConfig;
use crate::pipeline::{
    AggregationActor, Backpressure, ChangeEvent, ChangeKind, DEFAULT_QUEUE_CAPACITY,
    PipelineError, PipelineMetrics, PipelineState, PipelineStatus, PositionStats, Publisher,
    StatsReader, StatsTable,
};
use crate::store::{
    BatchError, Employee, EmployeeDraft, EmployeeId, RecordStore, StoreError, StoreLimits,
};

/// Builder for constructing an [`EmployeeSystem`].
#[derive(Debug, Clone)]
pub struct SystemBuilder {
    limits: StoreLimits,
    queue_capacity: usize,
    backpressure: Backpressure,
}

impl Default for SystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBuilder {
    pub fn new() -> Self {
        Self {
            limits: StoreLimits::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backpressure: Backpressure::default(),
        }
    }

    /// Builder preloaded with the store and pipeline sections of `config`.
    ///
    /// The seed roster is not applied; see [`EmployeeSystem::seed`].
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new()
            .store_limits(config.store.limits())
            .queue_capacity(config.pipeline.queue_capacity)
            .backpressure(config.pipeline.policy())
    }

    /// Set the validation bounds of the record store.
    pub fn store_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the change-event queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set what publishers do when the queue is full.
    pub fn backpressure(mut self, policy: Backpressure) -> Self {
        self.backpressure = policy;
        self
    }

    /// Create the store and start the aggregation pipeline.
    pub fn build(self) -> Result<EmployeeSystem, PipelineError> {
        let store = Arc::new(RecordStore::new(self.limits));
        let stats = StatsTable::default();
        let state = Arc::new(PipelineState::default());

        let (handle, tx) = AggregationActor::spawn(
            Arc::clone(&store),
            self.queue_capacity,
            Arc::clone(&stats),
            Arc::clone(&state),
        )?;

        tracing::debug!(
            queue_capacity = self.queue_capacity,
            policy = ?self.backpressure,
            "Employee system started"
        );

        Ok(EmployeeSystem {
            store,
            publisher: Publisher::new(tx, self.backpressure, Arc::clone(&state)),
            stats: StatsReader::new(stats),
            state,
            actor_handle: Mutex::new(Some(handle)),
        })
    }
}

/// Handle to a running employee system.
///
/// Safe to share between threads (`Arc<EmployeeSystem>`).
pub struct EmployeeSystem {
    store: Arc<RecordStore>,
    publisher: Publisher,
    stats: StatsReader,
    state: Arc<PipelineState>,
    actor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for EmployeeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmployeeSystem")
            .field("employees", &self.store.len())
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

impl EmployeeSystem {
    /// Start a system with default settings.
    pub fn start() -> Result<Self, PipelineError> {
        SystemBuilder::new().build()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub fn create(&self, draft: EmployeeDraft) -> Result<Employee, StoreError> {
        let created = self.store.create(draft)?;
        self.notify(&created, ChangeKind::Created);
        Ok(created)
    }

    /// Create an employee under a system-assigned id; `draft.id` is ignored.
    pub fn create_assigned(&self, draft: EmployeeDraft) -> Result<Employee, StoreError> {
        let created = self.store.create_assigned(draft)?;
        self.notify(&created, ChangeKind::Created);
        Ok(created)
    }

    /// Create several employees, continuing past failures.
    ///
    /// Returns one [`BatchError`] per rejected draft, in input order.
    pub fn create_many<I>(&self, drafts: I) -> Vec<BatchError>
    where
        I: IntoIterator<Item = EmployeeDraft>,
    {
        drafts
            .into_iter()
            .filter_map(|draft| {
                let id = draft.id;
                self.create(draft)
                    .err()
                    .map(|source| BatchError { id, source })
            })
            .collect()
    }

    /// Replace the caller-supplied fields. Rating history is kept.
    pub fn update(&self, draft: EmployeeDraft) -> Result<Employee, StoreError> {
        let updated = self.store.update(draft)?;
        if updated.position_changed() {
            self.notify(&updated.previous, ChangeKind::Updated);
        }
        self.notify(&updated.current, ChangeKind::Updated);
        Ok(updated.current)
    }

    pub fn remove(&self, id: EmployeeId) -> Result<Employee, StoreError> {
        let removed = self.store.remove(id)?;
        self.notify(&removed, ChangeKind::Removed);
        Ok(removed)
    }

    /// Append a rating in `[0, 5]` and return the record with its new mean.
    pub fn record_performance_rating(
        &self,
        id: EmployeeId,
        rating: f64,
    ) -> Result<Employee, StoreError> {
        let rated = self.store.record_performance_rating(id, rating)?;
        self.notify(&rated, ChangeKind::Rated);
        Ok(rated)
    }

    /// Create the configured seed roster and apply its ratings.
    ///
    /// Returns the number of employees created; failures are logged.
    pub fn seed(&self, config: &AppConfig) -> usize {
        let mut created = 0;
        for seed in &config.seed {
            match self.create(seed.draft()) {
                Ok(_) => created += 1,
                Err(e) => {
                    tracing::warn!(id = seed.id, error = %e, "Failed to seed employee");
                    continue;
                }
            }
            for &rating in &seed.ratings {
                if let Err(e) = self.record_performance_rating(seed.id, rating) {
                    tracing::warn!(id = seed.id, rating, error = %e, "Failed to seed rating");
                }
            }
        }
        created
    }

    fn notify(&self, employee: &Employee, kind: ChangeKind) {
        // The outcome is already counted and logged by the publisher.
        let _ = self
            .publisher
            .publish(ChangeEvent::for_employee(employee, kind));
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, id: EmployeeId) -> Result<Employee, StoreError> {
        self.store.get(id)
    }

    /// Snapshot of all employees in unspecified order.
    pub fn list(&self) -> Vec<Employee> {
        self.store.list()
    }

    /// Snapshot of all employees ordered by id.
    pub fn list_sorted(&self) -> Vec<Employee> {
        let mut employees = self.store.list();
        employees.sort_by_key(|e| e.id);
        employees
    }

    /// Employees matching a pure predicate over a single record.
    pub fn filter<F>(&self, predicate: F) -> Vec<Employee>
    where
        F: Fn(&Employee) -> bool,
    {
        self.store.filter(predicate)
    }

    pub fn history(&self, id: EmployeeId) -> Result<Vec<f64>, StoreError> {
        self.store.history(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn limits(&self) -> &StoreLimits {
        self.store.limits()
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    /// Latest statistics for a position. Eventually consistent with the store.
    pub fn position_stats(&self, position: &str) -> Option<PositionStats> {
        self.stats.get(position)
    }

    /// Latest statistics for every position seen so far, ordered by position.
    pub fn all_position_stats(&self) -> Vec<PositionStats> {
        self.stats.all()
    }

    /// Cloneable statistics reader that outlives borrows of the system.
    pub fn stats_reader(&self) -> StatsReader {
        self.stats.clone()
    }

    pub fn backpressure(&self) -> Backpressure {
        self.publisher.policy()
    }

    pub fn status(&self) -> PipelineStatus {
        self.state.status()
    }

    pub fn metrics(&self) -> PipelineMetrics {
        self.state.metrics()
    }

    /// Stop accepting change events, drain the queue and join the consumer.
    ///
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self) -> Result<(), PipelineError> {
        if self.state.begin_draining() {
            tracing::info!(queued = self.publisher.queued(), "Pipeline draining");
        }

        // Held across the join so concurrent callers return only once stopped.
        let mut guard = self
            .actor_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            if self.publisher.close().is_err() {
                tracing::warn!("Aggregation consumer already gone");
            }
            handle.join().map_err(|_| {
                // A panicking consumer never reached its own Stopped transition.
                self.state.mark_stopped();
                PipelineError::Join
            })?;
            tracing::info!(metrics = ?self.metrics(), "Employee system shut down");
        }

        Ok(())
    }
}

impl Drop for EmployeeSystem {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "Pipeline shutdown failed during drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, SeedEmployee, StoreConfig};
    use crate::pipeline::BackpressureMode;
    use crate::store::Department;
    use chrono::NaiveDate;
    use std::time::Duration;

    #[test]
    fn test_builder_defaults() {
        let system = SystemBuilder::new().build().unwrap();
        assert_eq!(system.status(), PipelineStatus::Running);
        assert_eq!(system.backpressure(), Backpressure::default());
        assert_eq!(system.limits(), &StoreLimits::default());
        system.shutdown().unwrap();
        assert_eq!(system.status(), PipelineStatus::Stopped);
    }

    #[test]
    fn test_builder_from_config() {
        let config = AppConfig {
            store: StoreConfig {
                min_id: 100,
                ..StoreConfig::default()
            },
            pipeline: PipelineConfig {
                queue_capacity: 4,
                backpressure: BackpressureMode::Block,
                publish_timeout: Duration::from_millis(10),
            },
            seed: Vec::new(),
        };

        let system = SystemBuilder::from_config(&config).build().unwrap();
        assert_eq!(system.backpressure(), Backpressure::Block);
        assert_eq!(system.limits().min_id, 100);
        assert!(
            system
                .create(EmployeeDraft::new(99, "Ann", "Lead", 60_000.0))
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn test_create_many_reports_failures() {
        let system = EmployeeSystem::start().unwrap();
        let errors = system.create_many([
            EmployeeDraft::new(1, "Ann", "Lead", 60_000.0),
            EmployeeDraft::new(1, "Bob", "Lead", 60_000.0),
            EmployeeDraft::new(2, "Cy", "Lead", 10.0),
            EmployeeDraft::new(3, "Dee", "Developer", 45_000.0),
        ]);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].id, 1);
        assert_eq!(errors[0].source, StoreError::AlreadyExists(1));
        assert_eq!(errors[1].id, 2);
        assert!(errors[1].source.is_invalid_argument());
        assert_eq!(system.len(), 2);
    }

    #[test]
    fn test_seed() {
        let config = AppConfig {
            seed: vec![
                SeedEmployee {
                    id: 101,
                    name: "Ann".into(),
                    position: "Lead".into(),
                    compensation: 60_000.0,
                    department: Some(Department::Engineering),
                    join_date: NaiveDate::from_ymd_opt(2021, 4, 1),
                    ratings: vec![4.0, 5.0, 9.0],
                },
                SeedEmployee {
                    id: 102,
                    name: "B".into(),
                    position: "Lead".into(),
                    compensation: 60_000.0,
                    department: None,
                    join_date: None,
                    ratings: vec![],
                },
            ],
            ..AppConfig::default()
        };

        let system = EmployeeSystem::start().unwrap();
        assert_eq!(system.seed(&config), 1);
        // The out-of-range rating is rejected and logged.
        assert_eq!(system.get(101).unwrap().performance, 4.5);
        assert_eq!(system.history(101).unwrap(), vec![4.0, 5.0]);

        let seeded = system.get(101).unwrap();
        assert_eq!(seeded.department, Some(Department::Engineering));
        assert_eq!(seeded.join_date, NaiveDate::from_ymd_opt(2021, 4, 1));
    }

    #[test]
    fn test_list_sorted() {
        let system = EmployeeSystem::start().unwrap();
        for id in [30, 10, 20] {
            system
                .create(EmployeeDraft::new(id, "Ann", "Lead", 60_000.0))
                .unwrap();
        }
        let ids: Vec<_> = system.list_sorted().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_writes_after_shutdown_still_commit() {
        let system = EmployeeSystem::start().unwrap();
        system.shutdown().unwrap();

        let created = system
            .create(EmployeeDraft::new(7, "Ann", "Lead", 60_000.0))
            .unwrap();
        assert_eq!(system.get(7).unwrap(), created);
        assert_eq!(system.metrics().dropped_closed, 1);
        assert!(system.position_stats("Lead").is_none());
    }

    #[test]
    fn test_update_notifies_old_and_new_position() {
        let system = EmployeeSystem::start().unwrap();
        system
            .create(EmployeeDraft::new(1, "Ann", "Developer", 60_000.0))
            .unwrap();
        system
            .update(EmployeeDraft::new(1, "Ann", "Lead", 65_000.0))
            .unwrap();
        system.shutdown().unwrap();

        // Created + old position + new position.
        assert_eq!(system.metrics().processed, 3);
        assert_eq!(
            system.position_stats("Developer").unwrap().employee_count,
            0
        );
        assert_eq!(system.position_stats("Lead").unwrap().employee_count, 1);
    }

    #[test]
    fn test_drop_shuts_down() {
        let system = EmployeeSystem::start().unwrap();
        let reader = system.stats_reader();
        system
            .create(EmployeeDraft::new(1, "Ann", "Lead", 60_000.0))
            .unwrap();
        drop(system);

        // Drop drained the queue before joining the consumer.
        assert_eq!(reader.get("Lead").unwrap().employee_count, 1);
    }
}
