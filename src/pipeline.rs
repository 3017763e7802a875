//! Aggregation Pipeline
//!
//! Derives per-position statistics from a stream of change events without
//! imposing unbounded latency on writers:
//! - **Publish**: writers enqueue a [`ChangeEvent`] under a [`Backpressure`] policy
//! - **Consume**: one background thread recomputes [`PositionStats`] from a store snapshot
//!
//! # Components
//!
//! - [`Publisher`]: Policy-driven enqueue, never fails the triggering write
//! - [`StatsReader`]: Read facade over the latest statistics
//! - [`PipelineStatus`] / [`PipelineMetrics`]: Lifecycle state and counters

mod actor;
mod error;
mod event;
mod publisher;
mod state;
mod stats;

pub(crate) use actor::AggregationActor;
pub use actor::DEFAULT_QUEUE_CAPACITY;
pub use error::{PipelineError, PublishError};
pub use event::{ChangeEvent, ChangeKind};
pub use publisher::{Backpressure, BackpressureMode, DEFAULT_PUBLISH_TIMEOUT, Publisher};
pub(crate) use state::PipelineState;
pub use state::{PipelineMetrics, PipelineStatus};
pub(crate) use stats::StatsTable;
pub use stats::{PositionStats, StatsReader};
