//! Roster - Concurrent Employee Record Store
//!
//! This crate provides an in-memory employee record store that can be shared
//! between any number of threads, coupled to a background pipeline deriving
//! per-position statistics from every write. It can be used as a library, or
//! run as a standalone service with the `roster` executable.
//!
//! # Architecture
//!
//! - **Store**: Lock-guarded records and rating histories, copies in and out
//! - **Pipeline**: Bounded change-event queue drained by one consumer thread
//! - **System**: Builder and handle tying both together with a clean shutdown
//! - **Config**: YAML configuration with validation
//!
//! # Example
//!
//! ```rust
//! use roster::{EmployeeDraft, EmployeeSystem};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let system = EmployeeSystem::start()?;
//! system.create(EmployeeDraft::new(101, "Ann", "Lead", 60_000.0))?;
//! system.record_performance_rating(101, 4.0)?;
//! system.record_performance_rating(101, 5.0)?;
//! assert_eq!(system.get(101)?.performance, 4.5);
//!
//! system.shutdown()?;
//! assert_eq!(system.position_stats("Lead").map(|s| s.employee_count), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod pipeline;
pub mod store;
pub mod system;

pub use pipeline::{
    Backpressure, BackpressureMode, PipelineError, PipelineMetrics, PipelineStatus,
    PositionStats, PublishError, StatsReader,
};
pub use store::{
    BatchError, Department, Employee, EmployeeDraft, EmployeeId, StoreError, StoreLimits,
};
pub use system::{EmployeeSystem, SystemBuilder};
