use criterion::{black_box, criterion_group, criterion_main, Criterion};
use parking_lot::Mutex;
use std::sync::Arc;

use market_depth_engine::{
    EventFlags, EventListener, EventSource, Feed, FeedSubscription, MarketDepthModel, Order, Side,
};

struct BenchFeed {
    listeners: Mutex<Vec<Arc<dyn EventListener<Order>>>>,
}

struct BenchSubscription;

impl FeedSubscription for BenchSubscription {
    fn set_symbols(&mut self, _symbols: Vec<String>) {}
    fn close(&mut self) {}
}

impl Feed<Order> for BenchFeed {
    fn create_subscription(
        &self,
        listener: Arc<dyn EventListener<Order>>,
    ) -> Box<dyn FeedSubscription> {
        self.listeners.lock().push(listener);
        Box::new(BenchSubscription)
    }
}

fn push(feed: &Arc<BenchFeed>, events: &[Order]) {
    let listeners = feed.listeners.lock();
    for listener in listeners.iter() {
        listener.on_events(events);
    }
}

fn snapshot_batch(count: u64) -> Vec<Order> {
    let source = EventSource::new("NTV");
    let mut orders: Vec<Order> = (0..count)
        .map(|i| {
            let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
            let price = if side == Side::Buy { 10_000 - i } else { 10_001 + i };
            Order::new("BENCH", source.clone(), i, side, price, 100 + i % 50).with_time(i)
        })
        .collect();
    orders[0].flags |= EventFlags::SNAPSHOT_BEGIN;
    let last = orders.len() - 1;
    orders[last].flags |= EventFlags::SNAPSHOT_END;
    orders
}

fn bench_snapshot_fold(c: &mut Criterion) {
    let feed = Arc::new(BenchFeed {
        listeners: Mutex::new(Vec::new()),
    });
    let _model = MarketDepthModel::builder()
        .feed(Arc::clone(&feed) as Arc<dyn Feed<Order>>)
        .symbol("BENCH")
        .depth_limit(10)
        .build()
        .unwrap();

    let batch = snapshot_batch(1_000);
    c.bench_function("snapshot_fold_1000", |b| {
        b.iter(|| push(&feed, black_box(&batch)))
    });
}

fn bench_incremental_updates(c: &mut Criterion) {
    let feed = Arc::new(BenchFeed {
        listeners: Mutex::new(Vec::new()),
    });
    let _model = MarketDepthModel::builder()
        .feed(Arc::clone(&feed) as Arc<dyn Feed<Order>>)
        .symbol("BENCH")
        .depth_limit(10)
        .build()
        .unwrap();

    push(&feed, &snapshot_batch(1_000));

    let source = EventSource::new("NTV");
    let mut size = 100u64;
    c.bench_function("incremental_update", |b| {
        b.iter(|| {
            size = if size == 100 { 101 } else { 100 };
            let update = Order::new("BENCH", source.clone(), 3, Side::Buy, 9_997, size);
            push(&feed, black_box(&[update]));
        })
    });
}

criterion_group!(benches, bench_snapshot_fold, bench_incremental_updates);
criterion_main!(benches);
