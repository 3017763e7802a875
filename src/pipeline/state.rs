//! Lifecycle state and counters shared between publishers and the consumer.

use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Lifecycle of the aggregation pipeline.
///
/// `Running` → `Draining` (shutdown requested, queued events still processed)
/// → `Stopped` (queue drained, consumer exited).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PipelineStatus {
    Running,
    Draining,
    Stopped,
}

impl PipelineStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Draining => 1,
            Self::Stopped => 2,
        }
    }
}

/// Point-in-time view of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineMetrics {
    /// Events accepted onto the queue.
    pub published: u64,
    /// Events dropped because the queue was full.
    pub dropped_saturated: u64,
    /// Events rejected because the pipeline was draining or stopped.
    pub dropped_closed: u64,
    /// Events the consumer has finished processing.
    pub processed: u64,
    /// Events waiting in the queue.
    pub queued: usize,
}

#[derive(Debug)]
pub(crate) struct PipelineState {
    status: AtomicU8,
    published: AtomicU64,
    dropped_saturated: AtomicU64,
    dropped_closed: AtomicU64,
    processed: AtomicU64,
    queued: AtomicUsize,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            status: AtomicU8::new(PipelineStatus::Running.as_u8()),
            published: AtomicU64::new(0),
            dropped_saturated: AtomicU64::new(0),
            dropped_closed: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            queued: AtomicUsize::new(0),
        }
    }
}

impl PipelineState {
    pub(crate) fn status(&self) -> PipelineStatus {
        PipelineStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.status() == PipelineStatus::Running
    }

    /// Move `Running` to `Draining`. Returns false if shutdown had already begun.
    pub(crate) fn begin_draining(&self) -> bool {
        self.status
            .compare_exchange(
                PipelineStatus::Running.as_u8(),
                PipelineStatus::Draining.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_stopped(&self) {
        self.status
            .store(PipelineStatus::Stopped.as_u8(), Ordering::Release);
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_saturated(&self) {
        self.dropped_saturated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_closed(&self) {
        self.dropped_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an event about to be enqueued. Paired with [`Self::leave_queue`]
    /// when the send fails or the consumer takes the event.
    pub(crate) fn enter_queue(&self) {
        self.queued.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn leave_queue(&self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub(crate) fn metrics(&self) -> PipelineMetrics {
        PipelineMetrics {
            published: self.published.load(Ordering::Relaxed),
            dropped_saturated: self.dropped_saturated.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            queued: self.queued(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let state = PipelineState::default();
        assert_eq!(state.status(), PipelineStatus::Running);
        assert!(state.is_accepting());

        assert!(state.begin_draining());
        assert_eq!(state.status(), PipelineStatus::Draining);
        assert!(!state.is_accepting());

        // Second request is a no-op.
        assert!(!state.begin_draining());

        state.mark_stopped();
        assert_eq!(state.status(), PipelineStatus::Stopped);
        assert!(!state.begin_draining());
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(PipelineStatus::Running.as_ref(), "running");
        assert_eq!(PipelineStatus::Draining.to_string(), "draining");
        assert_eq!(PipelineStatus::Stopped.as_ref(), "stopped");
    }

    #[test]
    fn test_counters() {
        let state = PipelineState::default();
        state.record_published();
        state.record_published();
        state.record_saturated();
        state.record_closed();
        state.record_processed();
        state.enter_queue();
        state.enter_queue();
        state.leave_queue();

        let m = state.metrics();
        assert_eq!(m.published, 2);
        assert_eq!(m.dropped_saturated, 1);
        assert_eq!(m.dropped_closed, 1);
        assert_eq!(m.processed, 1);
        assert_eq!(m.queued, 1);
    }
}
