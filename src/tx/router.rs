use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::events::{EventSource, IndexedEvent};
use crate::metrics::ModelMetrics;
use crate::tx::processor::TransactionProcessor;
use crate::tx::snapshot::{compact, SnapshotMode};
use crate::tx::strategy::{DeliveryBuffer, DeliveryMode};
use crate::utils::panic_message;

/// Receiver of reconstructed transactions and snapshots.
///
/// Invoked while the owning model's lock is held: implementations must not
/// re-enter the model and never run concurrently with each other for one
/// model instance.
pub trait TransactionListener<E>: Send + Sync {
    fn on_transaction(&self, source: &EventSource, events: &[E], is_snapshot: bool);
}

impl<E, F> TransactionListener<E> for F
where
    F: Fn(&EventSource, &[E], bool) + Send + Sync,
{
    fn on_transaction(&self, source: &EventSource, events: &[E], is_snapshot: bool) {
        self(source, events, is_snapshot)
    }
}

struct SourceLane<E> {
    processor: TransactionProcessor<E>,
    buffer: DeliveryBuffer<E>,
}

impl<E: IndexedEvent> SourceLane<E> {
    fn new(mode: DeliveryMode) -> Self {
        Self {
            processor: TransactionProcessor::new(),
            buffer: DeliveryBuffer::new(mode),
        }
    }
}

/// Demultiplexes a mixed-source event list into one reassembly processor
/// per source and fires the listener for every completed batch.
pub(crate) struct TransactionRouter<E: IndexedEvent> {
    lanes: HashMap<EventSource, SourceLane<E>>,
    snapshot_mode: SnapshotMode,
    delivery_mode: DeliveryMode,
    listener: Arc<dyn TransactionListener<E>>,
    metrics: Arc<ModelMetrics>,
    model_id: Uuid,
}

impl<E: IndexedEvent> TransactionRouter<E> {
    pub fn new(
        snapshot_mode: SnapshotMode,
        delivery_mode: DeliveryMode,
        listener: Arc<dyn TransactionListener<E>>,
        metrics: Arc<ModelMetrics>,
        model_id: Uuid,
    ) -> Self {
        Self {
            lanes: HashMap::new(),
            snapshot_mode,
            delivery_mode,
            listener,
            metrics,
            model_id,
        }
    }

    /// Process one raw input list. Events of the same source are assumed
    /// contiguous; a new group starts whenever the source changes. Buffered
    /// transaction batches of every lane that became ready during the pass
    /// are flushed exactly once at the end.
    pub fn process_events(&mut self, events: &[E]) {
        self.metrics.record_events(events.len());

        let mut ready: Vec<EventSource> = Vec::new();
        let mut start = 0;
        while start < events.len() {
            let source = events[start].source().clone();
            let mut end = start;
            while end < events.len() && events[end].source() == &source {
                end += 1;
            }
            self.process_run(&source, &events[start..end], &mut ready);
            start = end;
        }

        for source in ready {
            let flushed = self
                .lanes
                .get_mut(&source)
                .and_then(|lane| lane.buffer.flush());
            if let Some(events) = flushed {
                self.notify(&source, &events, false);
            }
        }
    }

    fn process_run(&mut self, source: &EventSource, run: &[E], ready: &mut Vec<EventSource>) {
        let mut deliveries: Vec<(Vec<E>, bool)> = Vec::new();
        {
            let lane = self
                .lanes
                .entry(source.clone())
                .or_insert_with(|| SourceLane::new(self.delivery_mode));
            for event in run {
                let Some(batch) = lane.processor.process_event(event.clone()) else {
                    continue;
                };
                if batch.is_snapshot {
                    // Transactions buffered earlier in this pass go out
                    // first so the listener observes feed order.
                    if let Some(buffered) = lane.buffer.flush() {
                        deliveries.push((buffered, false));
                    }
                    let snapshot = match self.snapshot_mode {
                        SnapshotMode::Processed => compact(batch.events),
                        SnapshotMode::Raw => batch.events,
                    };
                    deliveries.push((snapshot, true));
                } else if let Some(now) = lane.buffer.offer(batch.events) {
                    deliveries.push((now, false));
                } else if !ready.iter().any(|s| s == source) {
                    ready.push(source.clone());
                }
            }
        }

        for (events, is_snapshot) in deliveries {
            self.notify(source, &events, is_snapshot);
        }
    }

    /// Deliver one notification. A processed snapshot may legally be empty;
    /// an empty transaction flush never reaches this point.
    fn notify(&self, source: &EventSource, events: &[E], is_snapshot: bool) {
        if is_snapshot {
            self.metrics.record_snapshot();
        } else {
            self.metrics.record_transaction();
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.listener.on_transaction(source, events, is_snapshot)
        }));
        if let Err(panic) = outcome {
            self.metrics.record_listener_fault();
            error!(
                model = %self.model_id,
                source = %source,
                is_snapshot,
                "transaction listener panicked: {}",
                panic_message(&panic)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventFlags, Order, Side};
    use parking_lot::Mutex;

    type Recorded = (EventSource, Vec<Order>, bool);

    fn recording_listener() -> (Arc<Mutex<Vec<Recorded>>>, Arc<dyn TransactionListener<Order>>) {
        let calls: Arc<Mutex<Vec<Recorded>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let listener: Arc<dyn TransactionListener<Order>> =
            Arc::new(move |source: &EventSource, events: &[Order], is_snapshot: bool| {
                sink.lock().push((source.clone(), events.to_vec(), is_snapshot));
            });
        (calls, listener)
    }

    fn router(
        snapshot_mode: SnapshotMode,
        delivery_mode: DeliveryMode,
        listener: Arc<dyn TransactionListener<Order>>,
    ) -> TransactionRouter<Order> {
        TransactionRouter::new(
            snapshot_mode,
            delivery_mode,
            listener,
            Arc::new(ModelMetrics::new()),
            Uuid::new_v4(),
        )
    }

    fn order(source: &str, index: u64, flags: EventFlags) -> Order {
        Order::new("AAPL", EventSource::new(source), index, Side::Buy, 100, 10).with_flags(flags)
    }

    #[test]
    fn test_snapshot_then_batched_transactions() {
        // Snapshot of two events followed by three one-event transactions:
        // exactly one snapshot call, then one batched call with 3 events.
        let (calls, listener) = recording_listener();
        let mut router = router(SnapshotMode::Processed, DeliveryMode::Batch, listener);

        router.process_events(&[
            order("NTV", 1, EventFlags::SNAPSHOT_BEGIN),
            order("NTV", 0, EventFlags::SNAPSHOT_END),
            order("NTV", 1, EventFlags::empty()),
            order("NTV", 3, EventFlags::empty()),
            order("NTV", 2, EventFlags::empty()),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].2);
        assert_eq!(calls[0].1.len(), 2);
        assert!(!calls[1].2);
        assert_eq!(calls[1].1.len(), 3);
        assert_eq!(calls[0].1.len() + calls[1].1.len(), 5);
    }

    #[test]
    fn test_notify_mode_delivers_per_transaction() {
        let (calls, listener) = recording_listener();
        let mut router = router(SnapshotMode::Processed, DeliveryMode::Notify, listener);

        router.process_events(&[
            order("NTV", 1, EventFlags::empty()),
            order("NTV", 2, EventFlags::empty()),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, events, is_snapshot)| events.len() == 1 && !is_snapshot));
    }

    #[test]
    fn test_sources_never_mix_in_one_call() {
        let (calls, listener) = recording_listener();
        let mut router = router(SnapshotMode::Processed, DeliveryMode::Batch, listener);

        router.process_events(&[
            order("NTV", 1, EventFlags::empty()),
            order("NTV", 2, EventFlags::empty()),
            order("DEX", 1, EventFlags::empty()),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        for (source, events, _) in calls.iter() {
            assert!(events.iter().all(|e| e.source == *source));
        }
    }

    #[test]
    fn test_tx_pending_emits_nothing() {
        let (calls, listener) = recording_listener();
        let mut router = router(SnapshotMode::Processed, DeliveryMode::Notify, listener);

        router.process_events(&[
            order("NTV", 1, EventFlags::TX_PENDING),
            order("NTV", 2, EventFlags::TX_PENDING),
        ]);

        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_pending_transaction_survives_across_input_lists() {
        let (calls, listener) = recording_listener();
        let mut router = router(SnapshotMode::Processed, DeliveryMode::Batch, listener);

        router.process_events(&[order("NTV", 1, EventFlags::TX_PENDING)]);
        assert!(calls.lock().is_empty());

        router.process_events(&[order("NTV", 2, EventFlags::empty())]);
        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.len(), 2);
    }

    #[test]
    fn test_raw_snapshot_preserves_duplicates_and_flags() {
        let (calls, listener) = recording_listener();
        let mut router = router(SnapshotMode::Raw, DeliveryMode::Batch, listener);

        router.process_events(&[
            order("NTV", 1, EventFlags::SNAPSHOT_BEGIN),
            order("NTV", 1, EventFlags::SNAPSHOT_END),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.len(), 2);
        assert!(calls[0].1[0].flags.contains(EventFlags::SNAPSHOT_BEGIN));
    }

    #[test]
    fn test_empty_processed_snapshot_still_notifies() {
        let (calls, listener) = recording_listener();
        let mut router = router(SnapshotMode::Processed, DeliveryMode::Batch, listener);

        // A snapshot consisting solely of a removal compacts to nothing.
        router.process_events(&[order("NTV", 1, EventFlags::SNAPSHOT_BEGIN)
            .with_flags(
                EventFlags::SNAPSHOT_BEGIN | EventFlags::SNAPSHOT_END | EventFlags::REMOVE_EVENT,
            )]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].2);
        assert!(calls[0].1.is_empty());
    }

    #[test]
    fn test_listener_panic_does_not_stop_processing() {
        let calls: Arc<Mutex<Vec<Recorded>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let panicking: Arc<dyn TransactionListener<Order>> =
            Arc::new(move |source: &EventSource, events: &[Order], is_snapshot: bool| {
                if events[0].index == 1 {
                    panic!("listener fault");
                }
                sink.lock().push((source.clone(), events.to_vec(), is_snapshot));
            });
        let mut router = router(SnapshotMode::Processed, DeliveryMode::Notify, panicking);

        router.process_events(&[
            order("NTV", 1, EventFlags::empty()),
            order("NTV", 2, EventFlags::empty()),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1[0].index, 2);
    }
}
