//! Reconstructs flat per-source streams of indexed events into consistent,
//! atomically-visible transactions and snapshots, and maintains a live,
//! depth-limited two-sided order book with incremental change notification
//! on top of that view.
//!
//! The crate performs no network I/O and decodes no wire formats: an
//! injected [`feed::Feed`] pushes already-decoded typed events. Two public
//! models are built on the reassembly engine:
//!
//! - [`tx::IndexedTxModel`] / [`tx::TimeSeriesTxModel`] deliver reconstructed
//!   transaction and snapshot batches to a listener, per source.
//! - [`depth::MarketDepthModel`] folds those batches into a two-sided book
//!   and notifies with before/after state and add/remove/update diffs,
//!   paced by an aggregation window.

pub mod depth;
pub mod error;
pub mod events;
pub mod feed;
pub mod metrics;
pub mod tx;
pub mod utils;

// Re-export main types for convenience
pub use depth::{BookDiff, DepthSnapshot, MarketDepthListener, MarketDepthModel};
pub use error::{ModelError, ModelResult};
pub use events::{EventFlags, EventSource, IndexedEvent, Order, Price, Scope, Side, Size};
pub use feed::{EventListener, Feed, FeedSubscription};
pub use tx::{
    DeliveryMode, IndexedTxModel, SnapshotMode, TimeSeriesTxModel, TransactionListener,
    FROM_TIME_UNSUBSCRIBED,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        // Test that the main types are accessible
        let _flags = EventFlags::SNAPSHOT_BEGIN | EventFlags::TX_PENDING;
        let _order = Order::new("TEST", EventSource::default(), 1, Side::Buy, 10000, 100);
        let _error = ModelError::MissingSymbol;
    }
}
