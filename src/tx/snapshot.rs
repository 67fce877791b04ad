use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::events::{EventFlags, IndexedEvent};

/// How completed snapshot batches are delivered to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotMode {
    /// Replay the batch through an index-keyed replace map: duplicate
    /// indices collapse to last-write-wins, removed and zero-size entries
    /// are dropped, surviving flags are cleared.
    #[default]
    Processed,
    /// Deliver the batch exactly as buffered: duplicates, removals and
    /// original flags preserved.
    Raw,
}

/// Merge/clean pass applied to completed snapshot batches in
/// [`SnapshotMode::Processed`].
///
/// Value order is insertion order of the first-seen index; an index that is
/// removed and later re-added moves to the back. The result may legally be
/// empty.
pub(crate) fn compact<E: IndexedEvent>(events: Vec<E>) -> Vec<E> {
    let mut slots: Vec<Option<E>> = Vec::with_capacity(events.len());
    let mut by_index: HashMap<u64, usize> = HashMap::with_capacity(events.len());

    for mut event in events {
        if event.marks_removal() {
            if let Some(slot) = by_index.remove(&event.index()) {
                slots[slot] = None;
            }
            continue;
        }
        event.set_flags(EventFlags::empty());
        match by_index.entry(event.index()) {
            Entry::Occupied(occupied) => slots[*occupied.get()] = Some(event),
            Entry::Vacant(vacant) => {
                vacant.insert(slots.len());
                slots.push(Some(event));
            }
        }
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSource, Order, Side};
    use proptest::prelude::*;

    fn order(index: u64, size: u64) -> Order {
        Order::new("AAPL", EventSource::new("NTV"), index, Side::Buy, 100, size)
    }

    #[test]
    fn test_duplicate_indices_collapse_last_write_wins() {
        let compacted = compact(vec![order(1, 10), order(2, 20), order(1, 30)]);
        assert_eq!(compacted.len(), 2);
        assert_eq!(compacted[0].index, 1);
        assert_eq!(compacted[0].size, 30);
        assert_eq!(compacted[1].index, 2);
    }

    #[test]
    fn test_remove_flag_drops_index() {
        let compacted = compact(vec![
            order(1, 10),
            order(2, 20),
            order(1, 10).with_flags(EventFlags::REMOVE_EVENT),
        ]);
        assert_eq!(compacted.len(), 1);
        assert_eq!(compacted[0].index, 2);
    }

    #[test]
    fn test_zero_size_drops_index() {
        let compacted = compact(vec![order(1, 10), order(1, 0)]);
        assert!(compacted.is_empty());
    }

    #[test]
    fn test_reinserted_index_moves_to_back() {
        let compacted = compact(vec![order(1, 10), order(2, 20), order(1, 0), order(1, 40)]);
        assert_eq!(compacted.len(), 2);
        assert_eq!(compacted[0].index, 2);
        assert_eq!(compacted[1].index, 1);
        assert_eq!(compacted[1].size, 40);
    }

    #[test]
    fn test_flags_cleared_on_survivors() {
        let compacted = compact(vec![order(1, 10)
            .with_flags(EventFlags::SNAPSHOT_BEGIN | EventFlags::SNAPSHOT_END)]);
        assert_eq!(compacted.len(), 1);
        assert!(compacted[0].flags.is_empty());
    }

    #[test]
    fn test_removal_of_unknown_index_is_noop() {
        let compacted = compact(vec![order(5, 0), order(1, 10)]);
        assert_eq!(compacted.len(), 1);
        assert_eq!(compacted[0].index, 1);
    }

    proptest! {
        /// Compaction agrees with a naive last-write-wins model: for every
        /// index the survivor is the final non-removal write, and no removed
        /// index survives.
        #[test]
        fn prop_last_write_wins(writes in prop::collection::vec((0u64..8, 0u64..5), 0..40)) {
            let events: Vec<Order> = writes.iter().map(|&(index, size)| order(index, size)).collect();
            let compacted = compact(events);

            let mut expected: HashMap<u64, u64> = HashMap::new();
            for &(index, size) in &writes {
                if size == 0 {
                    expected.remove(&index);
                } else {
                    expected.insert(index, size);
                }
            }

            prop_assert_eq!(compacted.len(), expected.len());
            for survivor in &compacted {
                prop_assert_eq!(expected.get(&survivor.index).copied(), Some(survivor.size));
                prop_assert!(survivor.flags.is_empty());
            }
        }
    }
}
