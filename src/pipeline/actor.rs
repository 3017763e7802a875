//! Aggregation consumer with a dedicated thread and bounded MPSC channel.
//!
//! Single-consumer pattern: one thread owns the receiving end and processes
//! commands one at a time, so statistics writes for a position never race.
//! A `Shutdown` command queues behind every event published before it; the
//! consumer then drains whatever raced in after it and exits.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};

use crate::pipeline::error::PipelineError;
use crate::pipeline::event::ChangeEvent;
use crate::pipeline::state::PipelineState;
use crate::pipeline::stats::{PositionStats, StatsTable};
use crate::store::RecordStore;

// =============================================================================
// Constants
// =============================================================================

/// Default capacity of the change-event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Name of the consumer thread.
const THREAD_NAME: &str = "roster-aggregator";

// =============================================================================
// Commands
// =============================================================================

/// Commands sent to the aggregation consumer.
#[derive(Debug)]
pub(crate) enum Command {
    /// Recompute the statistics of the event's position.
    Event(ChangeEvent),
    /// Drain and stop.
    Shutdown,
}

// =============================================================================
// Actor
// =============================================================================

/// Background consumer recomputing position statistics.
pub(crate) struct AggregationActor {
    store: Arc<RecordStore>,
    rx: Receiver<Command>,
    stats: StatsTable,
    state: Arc<PipelineState>,
}

impl AggregationActor {
    /// Spawn the consumer thread.
    ///
    /// Returns the thread handle and the sending end of the queue.
    pub(crate) fn spawn(
        store: Arc<RecordStore>,
        queue_capacity: usize,
        stats: StatsTable,
        state: Arc<PipelineState>,
    ) -> Result<(JoinHandle<()>, SyncSender<Command>), PipelineError> {
        // A zero-capacity channel would turn every publish into a rendezvous.
        let (tx, rx) = mpsc::sync_channel(queue_capacity.max(1));

        let actor = AggregationActor {
            store,
            rx,
            stats,
            state,
        };
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || actor.run())?;

        Ok((handle, tx))
    }

    fn run(self) {
        tracing::info!("Aggregation pipeline started");

        loop {
            match self.rx.recv() {
                Ok(Command::Event(event)) => self.handle_event(event),
                Ok(Command::Shutdown) => break,
                Err(_) => {
                    tracing::warn!("Channel disconnected, shutting down");
                    break;
                }
            }
        }

        let drained = self.drain();
        tracing::info!(drained, "Aggregation pipeline draining complete");

        let state = Arc::clone(&self.state);
        // Drop the receiver before reporting Stopped so blocked publishers
        // observe a closed queue.
        drop(self);
        state.mark_stopped();
        tracing::info!("Aggregation pipeline stopped");
    }

    /// Process events that were already queued when shutdown was requested.
    fn drain(&self) -> usize {
        let mut count = 0;
        while let Ok(cmd) = self.rx.try_recv() {
            if let Command::Event(event) = cmd {
                self.handle_event(event);
                count += 1;
            }
        }
        count
    }

    fn handle_event(&self, event: ChangeEvent) {
        self.state.leave_queue();

        if event.position.trim().is_empty() {
            tracing::warn!(
                employee_id = event.employee_id,
                kind = %event.kind,
                "Change event without position, skipped"
            );
            self.state.record_processed();
            return;
        }

        // The snapshot is copied under the store's shared lock; aggregation
        // runs without it.
        let members = self.store.filter(|e| e.position == event.position);
        let stats = PositionStats::compute(event.position.clone(), &members);

        tracing::info!(
            position = %stats.position,
            count = stats.employee_count,
            average_performance = stats.average_performance,
            total_compensation = stats.total_compensation,
            computed_at = %stats.computed_at,
            trigger = %event.kind,
            employee_id = event.employee_id,
            "Position statistics updated"
        );

        self.stats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.position, stats);
        self.state.record_processed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::event::ChangeKind;
    use crate::pipeline::state::PipelineStatus;
    use crate::store::EmployeeDraft;

    type Harness = (
        JoinHandle<()>,
        SyncSender<Command>,
        StatsTable,
        Arc<PipelineState>,
    );

    fn spawn(store: Arc<RecordStore>, capacity: usize) -> Harness {
        let stats = StatsTable::default();
        let state = Arc::new(PipelineState::default());
        let (handle, tx) =
            AggregationActor::spawn(store, capacity, Arc::clone(&stats), Arc::clone(&state))
                .unwrap();
        (handle, tx, stats, state)
    }

    fn send(tx: &SyncSender<Command>, state: &PipelineState, event: ChangeEvent) {
        state.enter_queue();
        tx.send(Command::Event(event)).unwrap();
    }

    #[test]
    fn test_actor_lifecycle() {
        let (handle, tx, _stats, state) = spawn(Arc::new(RecordStore::default()), 10);
        assert_eq!(handle.thread().name(), Some(THREAD_NAME));

        state.begin_draining();
        tx.send(Command::Shutdown).unwrap();
        handle.join().unwrap();
        assert_eq!(state.status(), PipelineStatus::Stopped);
    }

    #[test]
    fn test_event_recomputes_position() {
        let store = Arc::new(RecordStore::default());
        store
            .create(EmployeeDraft::new(1, "Ann", "Developer", 50_000.0))
            .unwrap();
        store
            .create(EmployeeDraft::new(2, "Bob", "Developer", 70_000.0))
            .unwrap();
        store.record_performance_rating(1, 4.0).unwrap();
        store.record_performance_rating(2, 2.0).unwrap();

        let (handle, tx, stats, state) = spawn(Arc::clone(&store), 10);
        send(
            &tx,
            &state,
            ChangeEvent::new(2, "Developer", ChangeKind::Rated),
        );

        state.begin_draining();
        tx.send(Command::Shutdown).unwrap();
        handle.join().unwrap();

        let table = stats.read().unwrap();
        let dev = table.get("Developer").unwrap();
        assert_eq!(dev.employee_count, 2);
        assert_eq!(dev.average_performance, 3.0);
        assert_eq!(dev.total_compensation, 120_000.0);

        let metrics = state.metrics();
        assert_eq!(metrics.processed, 1);
        assert_eq!(metrics.queued, 0);
    }

    #[test]
    fn test_shutdown_processes_queued_events() {
        let store = Arc::new(RecordStore::default());
        for id in 1..=20 {
            let position = if id % 2 == 0 { "Developer" } else { "Lead" };
            store
                .create(EmployeeDraft::new(id, "Ann", position, 60_000.0))
                .unwrap();
        }

        let (handle, tx, stats, state) = spawn(Arc::clone(&store), 64);
        for id in 1..=20 {
            let position = if id % 2 == 0 { "Developer" } else { "Lead" };
            send(&tx, &state, ChangeEvent::new(id, position, ChangeKind::Created));
        }

        state.begin_draining();
        tx.send(Command::Shutdown).unwrap();
        handle.join().unwrap();

        assert_eq!(state.metrics().processed, 20);
        let table = stats.read().unwrap();
        assert_eq!(table["Developer"].employee_count, 10);
        assert_eq!(table["Lead"].employee_count, 10);
    }

    #[test]
    fn test_drain_after_shutdown_command() {
        let (handle, tx, stats, state) = spawn(Arc::new(RecordStore::default()), 8);

        // Occupy the consumer so both commands below are queued together.
        let guard = stats.write().unwrap();
        send(&tx, &state, ChangeEvent::new(1, "Lead", ChangeKind::Created));
        tx.send(Command::Shutdown).unwrap();
        send(&tx, &state, ChangeEvent::new(2, "Analyst", ChangeKind::Created));
        drop(guard);

        handle.join().unwrap();
        assert_eq!(state.metrics().processed, 2);
        assert!(stats.read().unwrap().contains_key("Analyst"));
    }

    #[test]
    fn test_blank_position_is_skipped() {
        let (handle, tx, stats, state) = spawn(Arc::new(RecordStore::default()), 10);
        send(&tx, &state, ChangeEvent::new(1, "  ", ChangeKind::Updated));
        send(&tx, &state, ChangeEvent::new(2, "Lead", ChangeKind::Removed));

        state.begin_draining();
        tx.send(Command::Shutdown).unwrap();
        handle.join().unwrap();

        let table = stats.read().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["Lead"].employee_count, 0);
        assert_eq!(state.metrics().processed, 2);
    }

    #[test]
    fn test_disconnected_queue_stops_actor() {
        let (handle, tx, _stats, state) = spawn(Arc::new(RecordStore::default()), 10);
        drop(tx);
        handle.join().unwrap();
        assert_eq!(state.status(), PipelineStatus::Stopped);
    }
}
