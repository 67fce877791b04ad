use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::events::flags::EventFlags;
use crate::events::source::EventSource;

pub type Price = u64; // Price in ticks (e.g., 1 tick = 0.01 cents)
pub type Size = u64;

/// An event uniquely identified within a source by a 64-bit index,
/// supporting add/update/remove semantics.
///
/// Implementors carry the flag word of the transaction protocol; the
/// reassembly engine interprets the five low bits and nothing else.
pub trait IndexedEvent: Clone + Send + 'static {
    fn symbol(&self) -> &str;
    fn source(&self) -> &EventSource;
    /// Total order within a source; for time-series events the index itself
    /// encodes time and sequence.
    fn index(&self) -> u64;
    fn flags(&self) -> EventFlags;
    fn set_flags(&mut self, flags: EventFlags);

    /// Whether this event deletes its index. The flag word is the generic
    /// signal; event types with a size payload may widen this.
    fn marks_removal(&self) -> bool {
        self.flags().contains(EventFlags::REMOVE_EVENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Aggregation scope of an order event, from coarsest to finest.
///
/// `Order` scope is an individual order; everything coarser is an
/// aggregate. The derived ordering is the comparator tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    Composite,
    Regional,
    Aggregate,
    Order,
}

/// A single order-like indexed event as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub source: EventSource,
    pub index: u64,
    pub flags: EventFlags,
    pub price: Price,
    /// Size of exactly zero signals deletion of this index.
    pub size: Size,
    pub side: Side,
    /// Epoch millis assigned by the feed.
    pub time: u64,
    pub sequence: u32,
    pub scope: Scope,
    pub exchange_code: char,
    /// Market-maker identifier for aggregated per-maker orders.
    pub maker_id: Option<String>,
}

impl Order {
    pub fn new(
        symbol: impl Into<String>,
        source: EventSource,
        index: u64,
        side: Side,
        price: Price,
        size: Size,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            source,
            index,
            flags: EventFlags::empty(),
            price,
            size,
            side,
            time: 0,
            sequence: 0,
            scope: Scope::Order,
            exchange_code: ' ',
            maker_id: None,
        }
    }

    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_time(mut self, time: u64) -> Self {
        self.time = time;
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_exchange(mut self, exchange_code: char) -> Self {
        self.exchange_code = exchange_code;
        self
    }

    pub fn with_maker(mut self, maker_id: impl Into<String>) -> Self {
        self.maker_id = Some(maker_id.into());
        self
    }

    /// Whether this order is an individual (non-aggregated) order.
    pub fn is_individual(&self) -> bool {
        self.scope == Scope::Order
    }

    pub fn is_aggregated(&self) -> bool {
        !self.is_individual()
    }

    pub fn maker_id(&self) -> Option<&str> {
        self.maker_id.as_deref()
    }

    /// Whether the order belongs on the book: non-zero size and not a
    /// removal event.
    pub fn shall_add(&self) -> bool {
        self.size > 0 && !self.flags.contains(EventFlags::REMOVE_EVENT)
    }

    /// The event time as a wall-clock timestamp.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.time as i64)
    }
}

impl IndexedEvent for Order {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn source(&self) -> &EventSource {
        &self.source
    }

    fn index(&self) -> u64 {
        self.index
    }

    fn flags(&self) -> EventFlags {
        self.flags
    }

    fn set_flags(&mut self, flags: EventFlags) {
        self.flags = flags;
    }

    fn marks_removal(&self) -> bool {
        self.flags.contains(EventFlags::REMOVE_EVENT) || self.size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_order(index: u64, size: Size) -> Order {
        Order::new("AAPL", EventSource::new("NTV"), index, Side::Buy, 15000, size)
    }

    #[test]
    fn test_order_creation_defaults() {
        let order = create_order(1, 100);
        assert_eq!(order.symbol, "AAPL");
        assert_eq!(order.index, 1);
        assert_eq!(order.price, 15000);
        assert!(order.flags.is_empty());
        assert_eq!(order.scope, Scope::Order);
        assert!(order.maker_id().is_none());
    }

    #[test]
    fn test_shall_add() {
        assert!(create_order(1, 100).shall_add());
        assert!(!create_order(1, 0).shall_add());
        assert!(!create_order(1, 100)
            .with_flags(EventFlags::REMOVE_EVENT)
            .shall_add());
    }

    #[test]
    fn test_marks_removal_includes_zero_size() {
        assert!(!create_order(1, 100).marks_removal());
        assert!(create_order(1, 0).marks_removal());
        assert!(create_order(1, 100)
            .with_flags(EventFlags::REMOVE_EVENT)
            .marks_removal());
    }

    #[test]
    fn test_scope_capabilities() {
        let individual = create_order(1, 100);
        assert!(individual.is_individual());

        let aggregated = create_order(2, 100)
            .with_scope(Scope::Aggregate)
            .with_maker("MMID");
        assert!(aggregated.is_aggregated());
        assert_eq!(aggregated.maker_id(), Some("MMID"));
    }

    #[test]
    fn test_scope_tie_break_order() {
        assert!(Scope::Composite < Scope::Regional);
        assert!(Scope::Regional < Scope::Aggregate);
        assert!(Scope::Aggregate < Scope::Order);
    }

    #[test]
    fn test_timestamp() {
        let order = create_order(1, 100).with_time(1_700_000_000_000);
        assert_eq!(
            order.timestamp().unwrap().timestamp_millis(),
            1_700_000_000_000
        );
    }
}
