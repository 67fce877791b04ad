use tracing::debug;

use crate::events::{EventFlags, IndexedEvent};

/// A materialized batch emitted when a transaction or snapshot boundary is
/// reached.
#[derive(Debug)]
pub(crate) struct CompletedBatch<E> {
    pub events: Vec<E>,
    pub is_snapshot: bool,
}

/// Per-source reassembly state machine.
///
/// Buffers events until a transaction or snapshot boundary, then emits the
/// batch. Two states only (`collecting-transaction` / `collecting-snapshot`),
/// re-entered identically after every completion; the machine never
/// terminates short of model disposal.
#[derive(Debug)]
pub(crate) struct TransactionProcessor<E> {
    pending: Vec<E>,
    partial_snapshot: bool,
    complete_snapshot: bool,
}

impl<E: IndexedEvent> TransactionProcessor<E> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            partial_snapshot: false,
            complete_snapshot: false,
        }
    }

    /// Feed one event through the machine. Returns the completed batch when
    /// this event closed a transaction or snapshot, `None` while buffering.
    pub fn process_event(&mut self, event: E) -> Option<CompletedBatch<E>> {
        let flags = event.flags();

        if flags.contains(EventFlags::SNAPSHOT_BEGIN) {
            if !self.pending.is_empty() {
                // Unterminated prior batch interrupted by a fresh snapshot:
                // policy-defined loss, not an error.
                debug!(
                    source = %event.source(),
                    dropped = self.pending.len(),
                    "snapshot begin discards unterminated batch"
                );
            }
            self.pending.clear();
            self.partial_snapshot = true;
            self.complete_snapshot = false;
        }

        if self.partial_snapshot && flags.completes_snapshot() {
            self.partial_snapshot = false;
            self.complete_snapshot = true;
        }

        self.pending.push(event);

        if flags.contains(EventFlags::TX_PENDING) || self.partial_snapshot {
            return None;
        }

        let events = std::mem::take(&mut self.pending);
        let is_snapshot = std::mem::replace(&mut self.complete_snapshot, false);
        Some(CompletedBatch { events, is_snapshot })
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
