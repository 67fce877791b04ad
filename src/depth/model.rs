use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::depth::side::{BookDiff, BookSide};
use crate::error::{ModelError, ModelResult};
use crate::events::{EventSource, Order, Side};
use crate::feed::Feed;
use crate::metrics::ModelMetrics;
use crate::tx::model::IndexedTxModel;
use crate::tx::router::TransactionListener;
use crate::tx::snapshot::SnapshotMode;
use crate::tx::strategy::DeliveryMode;
use crate::utils::panic_message;
use crate::utils::time::LatencyTimer;
use crate::utils::timer::OneShotTimer;

/// Receiver of book-change notifications.
///
/// Both methods run while the model lock is held: implementations must not
/// re-enter the model and never run concurrently for one model instance.
pub trait MarketDepthListener: Send + Sync {
    /// Full published book state after a change.
    fn on_book_changed(&self, _buy: &[Order], _sell: &[Order]) {}

    /// Incremental changes relative to the previous publish. Skipped when
    /// the published prefix is unchanged.
    fn on_book_diff(&self, _diff: &BookDiff) {}
}

struct NoopDepthListener;

impl MarketDepthListener for NoopDepthListener {}

type ChangedFn = dyn Fn(&[Order], &[Order]) + Send + Sync;
type DiffFn = dyn Fn(&BookDiff) + Send + Sync;

#[derive(Default)]
struct ClosureDepthListener {
    changed: Option<Box<ChangedFn>>,
    diff: Option<Box<DiffFn>>,
}

impl MarketDepthListener for ClosureDepthListener {
    fn on_book_changed(&self, buy: &[Order], sell: &[Order]) {
        if let Some(f) = &self.changed {
            f(buy, sell)
        }
    }

    fn on_book_diff(&self, diff: &BookDiff) {
        if let Some(f) = &self.diff {
            f(diff)
        }
    }
}

/// A point-in-time copy of the published book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Buy side, descending price order (best first).
    pub buy: Vec<Order>,
    /// Sell side, ascending price order (best first).
    pub sell: Vec<Order>,
}

struct DepthState {
    buy: BookSide,
    sell: BookSide,
    depth_limit: u32,
    aggregation_period: Duration,
    scheduled: bool,
    generation: u64,
    disposed: bool,
}

impl DepthState {
    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }
}

struct DepthCore {
    id: Uuid,
    symbol: String,
    /// Index lookup for O(1) removal; mutated only under the state lock.
    by_index: DashMap<(EventSource, u64), Order>,
    listener: Arc<dyn MarketDepthListener>,
    metrics: Arc<ModelMetrics>,
    timer: OneShotTimer,
    state: Mutex<DepthState>,
}

impl DepthCore {
    fn on_transaction(&self, source: &EventSource, events: &[Order], is_snapshot: bool) {
        let latency = LatencyTimer::start();
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        let changed = self.fold(&mut state, source, events, is_snapshot);
        self.metrics.record_update_duration(latency.elapsed());
        if changed {
            self.request_notification(&mut state, is_snapshot);
        }
    }

    /// Fold one reconstructed batch into the book. Returns whether the
    /// published prefix of either side plausibly changed.
    fn fold(
        &self,
        state: &mut DepthState,
        source: &EventSource,
        events: &[Order],
        is_snapshot: bool,
    ) -> bool {
        if is_snapshot {
            self.purge_source(state, source);
        }
        for event in events {
            let key = (source.clone(), event.index);
            if let Some((_, previous)) = self.by_index.remove(&key) {
                state.side_mut(previous.side).remove(&previous);
            }
            if event.shall_add() {
                self.by_index.insert(key, event.clone());
                state.side_mut(event.side).insert(event.clone());
            }
        }
        state.buy.is_dirty() || state.sell.is_dirty()
    }

    /// A full snapshot replaces everything previously known for its source.
    fn purge_source(&self, state: &mut DepthState, source: &EventSource) {
        let stale: Vec<Order> = self
            .by_index
            .iter()
            .filter(|entry| entry.key().0 == *source)
            .map(|entry| entry.value().clone())
            .collect();
        if !stale.is_empty() {
            debug!(model = %self.id, source = %source, purged = stale.len(), "snapshot purge");
        }
        for previous in stale {
            self.by_index.remove(&(source.clone(), previous.index));
            state.side_mut(previous.side).remove(&previous);
        }
    }

    fn request_notification(&self, state: &mut DepthState, from_snapshot: bool) {
        if from_snapshot || state.aggregation_period.is_zero() {
            self.cancel_pending(state);
            self.fire(state);
        } else if !state.scheduled {
            state.scheduled = true;
            self.timer.schedule(state.aggregation_period, state.generation);
        }
    }

    fn cancel_pending(&self, state: &mut DepthState) {
        if state.scheduled {
            state.scheduled = false;
            state.generation = state.generation.wrapping_add(1);
            self.timer.cancel();
        }
    }

    fn on_timer(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.disposed || !state.scheduled || state.generation != generation {
            return;
        }
        state.scheduled = false;
        state.generation = state.generation.wrapping_add(1);
        self.fire(&mut state);
    }

    fn fire(&self, state: &mut DepthState) {
        let buy_changes = state.buy.apply_changes();
        let sell_changes = state.sell.apply_changes();
        if buy_changes.is_none() && sell_changes.is_none() {
            return;
        }

        let mut diff = BookDiff::default();
        if let Some(changes) = buy_changes {
            diff.absorb(changes);
        }
        if let Some(changes) = sell_changes {
            diff.absorb(changes);
        }

        self.metrics.record_book_notification();
        self.metrics
            .set_published_levels(state.buy.published().len(), state.sell.published().len());

        let buy = state.buy.published();
        let sell = state.sell.published();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| {
            self.listener.on_book_changed(buy, sell)
        })) {
            self.metrics.record_listener_fault();
            error!(
                model = %self.id,
                "book-changed listener panicked: {}",
                panic_message(&panic)
            );
        }
        if !diff.is_empty() {
            if let Err(panic) =
                catch_unwind(AssertUnwindSafe(|| self.listener.on_book_diff(&diff)))
            {
                self.metrics.record_listener_fault();
                error!(
                    model = %self.id,
                    "book-diff listener panicked: {}",
                    panic_message(&panic)
                );
            }
        }
    }

    fn set_depth_limit(&self, limit: u32) {
        let mut state = self.state.lock();
        if state.disposed || state.depth_limit == limit {
            return;
        }
        state.depth_limit = limit;
        state.buy.set_depth_limit(limit);
        state.sell.set_depth_limit(limit);
        debug!(model = %self.id, limit, "depth limit changed");
        // Bypasses pacing: visible immediately.
        self.cancel_pending(&mut state);
        self.fire(&mut state);
    }

    fn set_aggregation_period(&self, period: Duration) {
        let mut state = self.state.lock();
        if state.disposed || state.aggregation_period == period {
            return;
        }
        state.aggregation_period = period;
        debug!(model = %self.id, period_ms = period.as_millis() as u64, "aggregation period changed");
        // Pending delivery is dropped; arming happens again on the next
        // update.
        self.cancel_pending(&mut state);
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        self.cancel_pending(&mut state);
        self.by_index.clear();
        state.buy.clear();
        state.sell.clear();
        info!(model = %self.id, "market depth model disposed");
    }
}

/// Bridges reconstructed transactions/snapshots into the book engine.
struct BookFold {
    core: Arc<DepthCore>,
}

impl TransactionListener<Order> for BookFold {
    fn on_transaction(&self, source: &EventSource, events: &[Order], is_snapshot: bool) {
        self.core.on_transaction(source, events, is_snapshot);
    }
}

/// Live, depth-limited, two-sided order book over a reconstructed indexed
/// event stream, with paced incremental change notification.
pub struct MarketDepthModel {
    core: Arc<DepthCore>,
    tx: IndexedTxModel<Order>,
}

impl std::fmt::Debug for MarketDepthModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDepthModel").finish_non_exhaustive()
    }
}

impl MarketDepthModel {
    pub fn builder() -> MarketDepthModelBuilder {
        MarketDepthModelBuilder::new()
    }

    /// Replace the configured source set (no-op when equal).
    pub fn set_sources(&self, sources: impl IntoIterator<Item = EventSource>) {
        self.tx.set_sources(sources);
    }

    /// Update the depth limit; 0 or `u32::MAX` means unbounded. Notifies
    /// immediately, bypassing the aggregation window.
    pub fn set_depth_limit(&self, limit: u32) {
        self.core.set_depth_limit(limit);
    }

    /// Update the aggregation window; zero means immediate notification.
    /// Cancels any pending delayed notification without re-arming.
    pub fn set_aggregation_period(&self, period: Duration) {
        self.core.set_aggregation_period(period);
    }

    pub fn depth_limit(&self) -> u32 {
        self.core.state.lock().depth_limit
    }

    pub fn aggregation_period(&self) -> Duration {
        self.core.state.lock().aggregation_period
    }

    /// Number of live orders across both sides.
    pub fn order_count(&self) -> usize {
        self.core.by_index.len()
    }

    /// Copy of the last published book state.
    pub fn snapshot(&self) -> DepthSnapshot {
        let state = self.core.state.lock();
        DepthSnapshot {
            symbol: self.core.symbol.clone(),
            timestamp: Utc::now(),
            buy: state.buy.published().to_vec(),
            sell: state.sell.published().to_vec(),
        }
    }

    /// Terminal: tears down the subscription, drops book state, stops
    /// notifications. Further events and mutator calls are no-ops.
    pub fn dispose(&self) {
        self.core.dispose();
        self.tx.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.state.lock().disposed
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &ModelMetrics {
        &self.core.metrics
    }
}

pub struct MarketDepthModelBuilder {
    feed: Option<Arc<dyn Feed<Order>>>,
    symbol: Option<String>,
    sources: BTreeSet<EventSource>,
    depth_limit: u32,
    aggregation_period: Duration,
    listener: Option<Arc<dyn MarketDepthListener>>,
    closures: ClosureDepthListener,
}

impl MarketDepthModelBuilder {
    fn new() -> Self {
        Self {
            feed: None,
            symbol: None,
            sources: BTreeSet::new(),
            depth_limit: 0,
            aggregation_period: Duration::ZERO,
            listener: None,
            closures: ClosureDepthListener::default(),
        }
    }

    pub fn feed(mut self, feed: Arc<dyn Feed<Order>>) -> Self {
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

    /// 0 or `u32::MAX` means unbounded (the default).
    pub fn depth_limit(mut self, limit: u32) -> Self {
        self.depth_limit = limit;
        self
    }

    /// Zero means immediate notification (the default).
    pub fn aggregation_period(mut self, period: Duration) -> Self {
        self.aggregation_period = period;
        self
    }

    /// Full listener implementation; takes precedence over the closure
    /// variants below.
    pub fn listener(mut self, listener: impl MarketDepthListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn listener_arc(mut self, listener: Arc<dyn MarketDepthListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn on_book_changed(
        mut self,
        f: impl Fn(&[Order], &[Order]) + Send + Sync + 'static,
    ) -> Self {
        self.closures.changed = Some(Box::new(f));
        self
    }

    pub fn on_book_diff(mut self, f: impl Fn(&BookDiff) + Send + Sync + 'static) -> Self {
        self.closures.diff = Some(Box::new(f));
        self
    }

    pub fn build(self) -> ModelResult<MarketDepthModel> {
        let feed = self.feed.ok_or(ModelError::MissingFeed)?;
        let symbol = self.symbol.ok_or(ModelError::MissingSymbol)?;
        let listener: Arc<dyn MarketDepthListener> = match self.listener {
            Some(listener) => listener,
            None if self.closures.changed.is_some() || self.closures.diff.is_some() => {
                Arc::new(self.closures)
            }
            None => Arc::new(NoopDepthListener),
        };

        let id = Uuid::new_v4();
        let metrics = Arc::new(ModelMetrics::new());

        // The timer worker needs the core, which needs the timer: wire the
        // callback through a slot filled in right after construction.
        let slot: Arc<OnceLock<Weak<DepthCore>>> = Arc::new(OnceLock::new());
        let timer = OneShotTimer::spawn("depth-aggregation", {
            let slot = Arc::clone(&slot);
            move |generation| {
                if let Some(core) = slot.get().and_then(Weak::upgrade) {
                    core.on_timer(generation);
                }
            }
        })?;

        let core = Arc::new(DepthCore {
            id,
            symbol: symbol.clone(),
            by_index: DashMap::new(),
            listener,
            metrics,
            timer,
            state: Mutex::new(DepthState {
                buy: BookSide::new(Side::Buy, self.depth_limit),
                sell: BookSide::new(Side::Sell, self.depth_limit),
                depth_limit: self.depth_limit,
                aggregation_period: self.aggregation_period,
                scheduled: false,
                generation: 0,
                disposed: false,
            }),
        });
        let _ = slot.set(Arc::downgrade(&core));

        let tx = IndexedTxModel::builder()
            .feed(feed)
            .symbol(symbol)
            .sources(self.sources)
            .snapshot_mode(SnapshotMode::Processed)
            .delivery_mode(DeliveryMode::Notify)
            .listener(BookFold {
                core: Arc::clone(&core),
            })
            .build()?;

        info!(model = %id, "market depth model created");
        Ok(MarketDepthModel { core, tx })
    }
}
