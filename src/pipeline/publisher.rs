//! Publish side of the aggregation queue.
//!
//! A [`Publisher`] applies one [`Backpressure`] policy to every change event.
//! Whatever the policy, a failed publish only loses an aggregation update; it
//! never fails the write that produced it.

use std::sync::Arc;
use std::sync::mpsc::{SyncSender, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::pipeline::actor::Command;
use crate::pipeline::error::PublishError;
use crate::pipeline::event::ChangeEvent;
use crate::pipeline::state::PipelineState;

/// Default wait for queue space under [`Backpressure::Timeout`].
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_millis(100);

/// What a publisher does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Wait up to the given duration, then drop the event with a warning.
    Timeout(Duration),
    /// Drop the event immediately. Never suspends the caller.
    DropWhenFull,
    /// Wait for space indefinitely. A slow pipeline throttles writers, so
    /// only use this with a queue sized well above the expected burst.
    Block,
}

impl Default for Backpressure {
    fn default() -> Self {
        Self::Timeout(DEFAULT_PUBLISH_TIMEOUT)
    }
}

impl Backpressure {
    /// Combine a configured mode with its timeout.
    pub fn from_mode(mode: BackpressureMode, timeout: Duration) -> Self {
        match mode {
            BackpressureMode::Timeout => Self::Timeout(timeout),
            BackpressureMode::Drop => Self::DropWhenFull,
            BackpressureMode::Block => Self::Block,
        }
    }

    pub fn mode(&self) -> BackpressureMode {
        match self {
            Self::Timeout(_) => BackpressureMode::Timeout,
            Self::DropWhenFull => BackpressureMode::Drop,
            Self::Block => BackpressureMode::Block,
        }
    }
}

/// Configuration name of a [`Backpressure`] policy.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackpressureMode {
    #[default]
    Timeout,
    Drop,
    Block,
}

/// Pause between enqueue attempts while waiting out a full queue.
const RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Sends change events to the aggregation consumer.
#[derive(Clone)]
pub struct Publisher {
    tx: SyncSender<Command>,
    policy: Backpressure,
    state: Arc<PipelineState>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    pub(crate) fn new(
        tx: SyncSender<Command>,
        policy: Backpressure,
        state: Arc<PipelineState>,
    ) -> Self {
        Self { tx, policy, state }
    }

    pub fn policy(&self) -> Backpressure {
        self.policy
    }

    /// Events currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.state.queued()
    }

    /// Enqueue an event under the configured policy.
    pub fn publish(&self, event: ChangeEvent) -> Result<(), PublishError> {
        if !self.state.is_accepting() {
            tracing::debug!(
                position = %event.position,
                employee_id = event.employee_id,
                "Pipeline shutting down, change event ignored"
            );
            self.state.record_closed();
            return Err(PublishError::Closed);
        }

        self.state.enter_queue();
        let cmd = Command::Event(event);
        let result = match self.policy {
            Backpressure::Timeout(timeout) => {
                self.send_within(cmd, timeout).map_err(|e| match e {
                    TrySendError::Full(Command::Event(event)) => {
                        tracing::warn!(
                            position = %event.position,
                            employee_id = event.employee_id,
                            ?timeout,
                            "Pipeline busy, skipped statistics update"
                        );
                        PublishError::Saturated
                    }
                    TrySendError::Full(_) => PublishError::Saturated,
                    TrySendError::Disconnected(_) => PublishError::Closed,
                })
            }
            Backpressure::DropWhenFull => self.tx.try_send(cmd).map_err(|e| match e {
                TrySendError::Full(Command::Event(event)) => {
                    tracing::debug!(
                        position = %event.position,
                        employee_id = event.employee_id,
                        "Queue full, dropping change event"
                    );
                    PublishError::Saturated
                }
                TrySendError::Full(_) => PublishError::Saturated,
                TrySendError::Disconnected(_) => PublishError::Closed,
            }),
            Backpressure::Block => self.tx.send(cmd).map_err(|_| PublishError::Closed),
        };

        match result {
            Ok(()) => self.state.record_published(),
            Err(PublishError::Saturated) => {
                self.state.leave_queue();
                self.state.record_saturated();
            }
            Err(PublishError::Closed) => {
                self.state.leave_queue();
                self.state.record_closed();
            }
        }
        result
    }

    /// Ask the consumer to drain and stop once it reaches this point in the
    /// queue. Waits for queue space; fails only if the consumer is gone.
    pub(crate) fn close(&self) -> Result<(), PublishError> {
        self.tx
            .send(Command::Shutdown)
            .map_err(|_| PublishError::Closed)
    }

    /// `try_send` until it succeeds, the consumer disconnects or `timeout`
    /// elapses.
    ///
    /// `SyncSender` has no timed send, so a saturated queue is polled every
    /// [`RETRY_INTERVAL`]. This costs a little CPU per waiting writer and
    /// bounds the overshoot past `timeout` to one interval.
    fn send_within(
        &self,
        mut cmd: Command,
        timeout: Duration,
    ) -> Result<(), TrySendError<Command>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.tx.try_send(cmd) {
                Err(TrySendError::Full(back)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TrySendError::Full(back));
                    }
                    cmd = back;
                    thread::sleep(RETRY_INTERVAL.min(deadline - now));
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::event::ChangeKind;
    use std::str::FromStr;
    use std::sync::mpsc::{self, Receiver};

    fn event(id: i64) -> ChangeEvent {
        ChangeEvent::new(id, "Developer", ChangeKind::Created)
    }

    fn publisher(
        capacity: usize,
        policy: Backpressure,
    ) -> (Publisher, Receiver<Command>, Arc<PipelineState>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let state = Arc::new(PipelineState::default());
        (Publisher::new(tx, policy, Arc::clone(&state)), rx, state)
    }

    fn employee_id(cmd: Command) -> i64 {
        match cmd {
            Command::Event(event) => event.employee_id,
            Command::Shutdown => panic!("unexpected shutdown command"),
        }
    }

    #[test]
    fn test_backpressure_mode_from_str() {
        assert_eq!(
            BackpressureMode::from_str("timeout").unwrap(),
            BackpressureMode::Timeout
        );
        assert_eq!(
            BackpressureMode::from_str("DROP").unwrap(),
            BackpressureMode::Drop
        );
        assert_eq!(
            BackpressureMode::from_str("Block").unwrap(),
            BackpressureMode::Block
        );
        assert!(BackpressureMode::from_str("spill").is_err());
    }

    #[test]
    fn test_backpressure_mode_roundtrip() {
        let timeout = Duration::from_millis(250);
        for mode in [
            BackpressureMode::Timeout,
            BackpressureMode::Drop,
            BackpressureMode::Block,
        ] {
            assert_eq!(Backpressure::from_mode(mode, timeout).mode(), mode);
        }
        assert_eq!(
            Backpressure::from_mode(BackpressureMode::Timeout, timeout),
            Backpressure::Timeout(timeout)
        );
    }

    #[test]
    fn test_drop_when_full_never_waits() {
        let (publisher, rx, state) = publisher(1, Backpressure::DropWhenFull);

        assert!(publisher.publish(event(1)).is_ok());
        assert_eq!(publisher.publish(event(2)), Err(PublishError::Saturated));
        assert_eq!(publisher.queued(), 1);

        let m = state.metrics();
        assert_eq!(m.published, 1);
        assert_eq!(m.dropped_saturated, 1);

        assert_eq!(employee_id(rx.try_recv().unwrap()), 1);
    }

    #[test]
    fn test_timeout_drops_after_waiting() {
        let timeout = Duration::from_millis(50);
        let (publisher, _rx, state) = publisher(1, Backpressure::Timeout(timeout));

        publisher.publish(event(1)).unwrap();
        let started = Instant::now();
        assert_eq!(publisher.publish(event(2)), Err(PublishError::Saturated));
        let waited = started.elapsed();
        assert!(waited >= timeout);
        assert!(waited < timeout + Duration::from_secs(1));
        assert_eq!(state.metrics().dropped_saturated, 1);
        assert_eq!(state.metrics().queued, 1);
    }

    #[test]
    fn test_timeout_succeeds_when_space_frees_up() {
        let (publisher, rx, _state) =
            publisher(1, Backpressure::Timeout(Duration::from_secs(5)));
        publisher.publish(event(1)).unwrap();

        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let first = employee_id(rx.recv().unwrap());
            let second = employee_id(rx.recv().unwrap());
            (first, second)
        });

        publisher.publish(event(2)).unwrap();
        assert_eq!(consumer.join().unwrap(), (1, 2));
    }

    #[test]
    fn test_block_fails_when_consumer_gone() {
        let (publisher, rx, state) = publisher(1, Backpressure::Block);
        publisher.publish(event(1)).unwrap();
        drop(rx);
        assert_eq!(publisher.publish(event(2)), Err(PublishError::Closed));
        assert_eq!(state.metrics().dropped_closed, 1);
    }

    #[test]
    fn test_rejected_while_draining() {
        let (publisher, rx, state) = publisher(4, Backpressure::Block);
        assert!(state.begin_draining());

        assert_eq!(publisher.publish(event(1)), Err(PublishError::Closed));
        assert!(rx.try_recv().is_err());
        assert_eq!(state.metrics().dropped_closed, 1);
        assert_eq!(state.metrics().queued, 0);
    }

    #[test]
    fn test_close_queues_behind_events() {
        let (publisher, rx, _state) = publisher(4, Backpressure::DropWhenFull);
        publisher.publish(event(1)).unwrap();
        publisher.close().unwrap();

        assert_eq!(employee_id(rx.recv().unwrap()), 1);
        assert!(matches!(rx.recv().unwrap(), Command::Shutdown));
    }
}
