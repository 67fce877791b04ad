use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::events::{EventSource, IndexedEvent};
use crate::feed::{EventListener, Feed, FeedSubscription};
use crate::metrics::ModelMetrics;
use crate::tx::router::{TransactionListener, TransactionRouter};
use crate::tx::snapshot::SnapshotMode;
use crate::tx::strategy::DeliveryMode;
use crate::tx::subscription::{SourceSubscription, TimeSubscription, FROM_TIME_UNSUBSCRIBED};

/// State shared between the feed callback and the public mutators, guarded
/// by the single per-model lock.
struct TxState<E: IndexedEvent, S> {
    router: TransactionRouter<E>,
    subscription: S,
    feed_sub: Option<Box<dyn FeedSubscription>>,
    disposed: bool,
}

struct TxCore<E: IndexedEvent, S> {
    id: Uuid,
    metrics: Arc<ModelMetrics>,
    state: Mutex<TxState<E, S>>,
}

impl<E: IndexedEvent, S: Send + 'static> TxCore<E, S> {
    fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        if let Some(mut feed_sub) = state.feed_sub.take() {
            feed_sub.close();
        }
        info!(model = %self.id, "transaction model disposed");
    }

    fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl<E: IndexedEvent, S: Send + 'static> EventListener<E> for TxCore<E, S> {
    fn on_events(&self, events: &[E]) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.router.process_events(events);
    }
}

/// Reassembles a per-source indexed event stream into atomically-visible
/// transactions and snapshots, delivered to a [`TransactionListener`].
///
/// Subscribes by source set: an empty set receives all sources of the
/// configured symbol.
pub struct IndexedTxModel<E: IndexedEvent> {
    core: Arc<TxCore<E, SourceSubscription>>,
}

impl<E: IndexedEvent> std::fmt::Debug for IndexedTxModel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedTxModel").finish_non_exhaustive()
    }
}

impl<E: IndexedEvent> IndexedTxModel<E> {
    pub fn builder() -> IndexedTxModelBuilder<E> {
        IndexedTxModelBuilder::new()
    }

    /// Replace the configured source set. A set equal to the current one is
    /// a no-op; otherwise the whole subscription is replaced atomically.
    pub fn set_sources(&self, sources: impl IntoIterator<Item = EventSource>) {
        let sources: BTreeSet<EventSource> = sources.into_iter().collect();
        let mut state = self.core.state.lock();
        if state.disposed {
            return;
        }
        if !state.subscription.set_sources(sources) {
            return;
        }
        let symbols = state.subscription.symbols();
        if let Some(feed_sub) = state.feed_sub.as_mut() {
            feed_sub.set_symbols(symbols);
        }
        debug!(model = %self.core.id, "source set replaced");
    }

    /// Terminal: tears down the subscription; further delivered events and
    /// mutator calls are no-ops.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &ModelMetrics {
        &self.core.metrics
    }
}

pub struct IndexedTxModelBuilder<E: IndexedEvent> {
    feed: Option<Arc<dyn Feed<E>>>,
    symbol: Option<String>,
    sources: BTreeSet<EventSource>,
    snapshot_mode: SnapshotMode,
    delivery_mode: DeliveryMode,
    listener: Option<Arc<dyn TransactionListener<E>>>,
}

impl<E: IndexedEvent> IndexedTxModelBuilder<E> {
    fn new() -> Self {
        Self {
            feed: None,
            symbol: None,
            sources: BTreeSet::new(),
            snapshot_mode: SnapshotMode::default(),
            delivery_mode: DeliveryMode::default(),
            listener: None,
        }
    }

    pub fn feed(mut self, feed: Arc<dyn Feed<E>>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// The single subscription symbol. Multi-symbol subscriptions are not
    /// supported.
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = EventSource>) -> Self {
        self.sources = sources.into_iter().collect();
        self
    }

    pub fn snapshot_mode(mut self, mode: SnapshotMode) -> Self {
        self.snapshot_mode = mode;
        self
    }

    pub fn delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    pub fn listener(mut self, listener: impl TransactionListener<E> + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn listener_arc(mut self, listener: Arc<dyn TransactionListener<E>>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> ModelResult<IndexedTxModel<E>> {
        let feed = self.feed.ok_or(ModelError::MissingFeed)?;
        let symbol = self.symbol.ok_or(ModelError::MissingSymbol)?;
        let listener = self.listener.ok_or(ModelError::MissingListener)?;

        let id = Uuid::new_v4();
        let metrics = Arc::new(ModelMetrics::new());
        let router = TransactionRouter::new(
            self.snapshot_mode,
            self.delivery_mode,
            listener,
            Arc::clone(&metrics),
            id,
        );
        let subscription = SourceSubscription::new(symbol.clone(), self.sources);
        let core = Arc::new(TxCore {
            id,
            metrics,
            state: Mutex::new(TxState {
                router,
                subscription,
                feed_sub: None,
                disposed: false,
            }),
        });

        let mut feed_sub = feed.create_subscription(core.clone());
        {
            let mut state = core.state.lock();
            feed_sub.set_symbols(state.subscription.symbols());
            state.feed_sub = Some(feed_sub);
        }

        info!(model = %id, symbol = %symbol, "indexed transaction model created");
        Ok(IndexedTxModel { core })
    }
}

/// Time-series flavor of the transaction model: subscribes a single symbol
/// from a given time, or nothing while the from-time is the sentinel
/// [`FROM_TIME_UNSUBSCRIBED`].
pub struct TimeSeriesTxModel<E: IndexedEvent> {
    core: Arc<TxCore<E, TimeSubscription>>,
}

impl<E: IndexedEvent> TimeSeriesTxModel<E> {
    pub fn builder() -> TimeSeriesTxModelBuilder<E> {
        TimeSeriesTxModelBuilder::new()
    }

    /// Replace the from-time. An unchanged value is a no-op; the sentinel
    /// empties the subscription.
    pub fn set_from_time(&self, from_time: u64) {
        let mut state = self.core.state.lock();
        if state.disposed {
            return;
        }
        if !state.subscription.set_from_time(from_time) {
            return;
        }
        let symbols = state.subscription.symbols();
        if let Some(feed_sub) = state.feed_sub.as_mut() {
            feed_sub.set_symbols(symbols);
        }
        debug!(model = %self.core.id, from_time, "from-time replaced");
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

pub struct TimeSeriesTxModelBuilder<E: IndexedEvent> {
    feed: Option<Arc<dyn Feed<E>>>,
    symbol: Option<String>,
    from_time: u64,
    snapshot_mode: SnapshotMode,
    delivery_mode: DeliveryMode,
    listener: Option<Arc<dyn TransactionListener<E>>>,
}

impl<E: IndexedEvent> TimeSeriesTxModelBuilder<E> {
    fn new() -> Self {
        Self {
            feed: None,
            symbol: None,
            from_time: FROM_TIME_UNSUBSCRIBED,
            snapshot_mode: SnapshotMode::default(),
            delivery_mode: DeliveryMode::default(),
            listener: None,
        }
    }

    pub fn feed(mut self, feed: Arc<dyn Feed<E>>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn from_time(mut self, from_time: u64) -> Self {
        self.from_time = from_time;
        self
    }

    pub fn snapshot_mode(mut self, mode: SnapshotMode) -> Self {
        self.snapshot_mode = mode;
        self
    }

    pub fn delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    pub fn listener(mut self, listener: impl TransactionListener<E> + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn listener_arc(mut self, listener: Arc<dyn TransactionListener<E>>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> ModelResult<TimeSeriesTxModel<E>> {
        let feed = self.feed.ok_or(ModelError::MissingFeed)?;
        let symbol = self.symbol.ok_or(ModelError::MissingSymbol)?;
        let listener = self.listener.ok_or(ModelError::MissingListener)?;

        let id = Uuid::new_v4();
        let metrics = Arc::new(ModelMetrics::new());
        let router = TransactionRouter::new(
            self.snapshot_mode,
            self.delivery_mode,
            listener,
            Arc::clone(&metrics),
            id,
        );
        let subscription = TimeSubscription::new(symbol.clone(), self.from_time);
        let core = Arc::new(TxCore {
            id,
            metrics,
            state: Mutex::new(TxState {
                router,
                subscription,
                feed_sub: None,
                disposed: false,
            }),
        });

        let mut feed_sub = feed.create_subscription(core.clone());
        {
            let mut state = core.state.lock();
            feed_sub.set_symbols(state.subscription.symbols());
            state.feed_sub = Some(feed_sub);
        }

        info!(model = %id, symbol = %symbol, "time-series transaction model created");
        Ok(TimeSeriesTxModel { core })
    }
}
