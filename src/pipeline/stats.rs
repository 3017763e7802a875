//! Per-position aggregate snapshots and their read facade.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::Employee;

/// Statistics table shared between the consumer (sole writer) and readers.
pub(crate) type StatsTable = Arc<RwLock<HashMap<String, PositionStats>>>;

/// Aggregate view of all employees holding one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionStats {
    pub position: String,
    /// Mean performance score of the members, 0 when there are none.
    pub average_performance: f64,
    pub employee_count: usize,
    pub total_compensation: f64,
    /// When this snapshot was computed (UTC).
    pub computed_at: DateTime<Utc>,
}

impl PositionStats {
    /// Aggregate `members`, which must all hold `position`.
    pub fn compute(position: impl Into<String>, members: &[Employee]) -> Self {
        let employee_count = members.len();
        let total_performance: f64 = members.iter().map(|e| e.performance).sum();
        let total_compensation: f64 = members.iter().map(|e| e.compensation).sum();

        let average_performance = if employee_count == 0 {
            0.0
        } else {
            total_performance / employee_count as f64
        };

        Self {
            position: position.into(),
            average_performance,
            employee_count,
            total_compensation,
            computed_at: Utc::now(),
        }
    }

    /// Mean compensation of the members, 0 when there are none.
    pub fn average_compensation(&self) -> f64 {
        if self.employee_count == 0 {
            0.0
        } else {
            self.total_compensation / self.employee_count as f64
        }
    }
}

/// Read-only access to the latest statistics per position.
#[derive(Clone)]
pub struct StatsReader {
    table: StatsTable,
}

impl std::fmt::Debug for StatsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsReader")
            .field("positions", &self.len())
            .finish_non_exhaustive()
    }
}

impl StatsReader {
    pub(crate) fn new(table: StatsTable) -> Self {
        Self { table }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, PositionStats>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest snapshot for a position, if one was ever computed.
    pub fn get(&self, position: &str) -> Option<PositionStats> {
        self.read().get(position).cloned()
    }

    /// All snapshots, ordered by position.
    pub fn all(&self) -> Vec<PositionStats> {
        let mut stats: Vec<_> = self.read().values().cloned().collect();
        stats.sort_by(|a, b| a.position.cmp(&b.position));
        stats
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
