//! Pipeline error types.
//!
//! [`PublishError`] is a soft condition: it is counted and logged but never
//! turned into a failure of the write that triggered the publish.
//! [`PipelineError`] covers the lifecycle of the consumer thread.

use thiserror::Error;

/// Why a change event did not reach the aggregation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The queue stayed full for the whole allowed wait.
    #[error("aggregation pipeline saturated")]
    Saturated,

    /// The pipeline is draining or stopped.
    #[error("aggregation pipeline closed")]
    Closed,
}

/// Errors starting or stopping the aggregation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The consumer thread could not be spawned.
    #[error("failed to spawn aggregation thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The consumer thread panicked.
    #[error("failed to join aggregation thread")]
    Join,
}
