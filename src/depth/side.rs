use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::{EventSource, Order, Side};
use crate::depth::ordering::OrderKey;

/// Added/removed/updated entries of one published book change, both sides
/// merged. Keys are `(source, index)`; an entry counts as updated only when
/// its size differs from the previous publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookDiff {
    pub added: Vec<Order>,
    pub removed: Vec<Order>,
    pub updated: Vec<Order>,
}

impl BookDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    pub(crate) fn absorb(&mut self, changes: SideChanges) {
        self.added.extend(changes.added);
        self.removed.extend(changes.removed);
        self.updated.extend(changes.updated);
    }
}

#[derive(Debug, Default)]
pub(crate) struct SideChanges {
    pub added: Vec<Order>,
    pub removed: Vec<Order>,
    pub updated: Vec<Order>,
}

/// One side of the depth-limited book: the full live container in
/// comparator order plus the last published prefix.
#[derive(Debug)]
pub(crate) struct BookSide {
    side: Side,
    live: BTreeMap<OrderKey, Order>,
    published: Vec<Order>,
    /// `usize::MAX` means unbounded.
    depth_limit: usize,
    dirty: bool,
}

fn normalize_depth_limit(limit: u32) -> usize {
    if limit == 0 || limit == u32::MAX {
        usize::MAX
    } else {
        limit as usize
    }
}

impl BookSide {
    pub fn new(side: Side, depth_limit: u32) -> Self {
        Self {
            side,
            live: BTreeMap::new(),
            published: Vec::new(),
            depth_limit: normalize_depth_limit(depth_limit),
            dirty: false,
        }
    }

    /// The last published snapshot: a comparator-order prefix of the live
    /// container, at most `depth_limit` long.
    pub fn published(&self) -> &[Order] {
        &self.published
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Update the depth limit. Unconditionally marks the side dirty.
    pub fn set_depth_limit(&mut self, limit: u32) {
        self.depth_limit = normalize_depth_limit(limit);
        self.dirty = true;
    }

    pub fn insert(&mut self, order: Order) {
        debug_assert_eq!(order.side, self.side);
        let key = OrderKey::for_order(&order);
        self.live.insert(key.clone(), order);
        self.mark_if_affects_published(&key);
    }

    pub fn remove(&mut self, order: &Order) {
        let key = OrderKey::for_order(order);
        if self.live.remove(&key).is_some() {
            self.mark_if_affects_published(&key);
        }
    }

    /// Disposal path: drop live and published state without marking dirty.
    pub fn clear(&mut self) {
        self.live.clear();
        self.published.clear();
        self.dirty = false;
    }

    /// Cheap pre-filter: mark dirty only when the mutation could plausibly
    /// change the published prefix (unbounded depth, a live set that fits
    /// the limit entirely, or a mutated element ranking at or before the
    /// last published entry).
    fn mark_if_affects_published(&mut self, key: &OrderKey) {
        if self.dirty {
            return;
        }
        if self.depth_limit == usize::MAX || self.live.len() <= self.depth_limit {
            self.dirty = true;
            return;
        }
        match self.published.last() {
            None => self.dirty = true,
            Some(last) => {
                if *key <= OrderKey::for_order(last) {
                    self.dirty = true;
                }
            }
        }
    }

    /// Rematerialize the published prefix and diff it against the previous
    /// publish. Returns `None` when the side is clean.
    pub fn apply_changes(&mut self) -> Option<SideChanges> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;

        let fresh: Vec<Order> = self
            .live
            .values()
            .take(self.depth_limit)
            .cloned()
            .collect();

        let mut changes = SideChanges::default();
        {
            let mut previous: HashMap<(EventSource, u64), &Order> = self
                .published
                .iter()
                .map(|order| ((order.source.clone(), order.index), order))
                .collect();

            for order in &fresh {
                match previous.remove(&(order.source.clone(), order.index)) {
                    None => changes.added.push(order.clone()),
                    Some(prev) if prev.size != order.size => changes.updated.push(order.clone()),
                    Some(_) => {}
                }
            }
            changes.removed = self
                .published
                .iter()
                .filter(|order| previous.contains_key(&(order.source.clone(), order.index)))
                .cloned()
                .collect();
        }

        self.published = fresh;
        Some(changes)
    }
}
