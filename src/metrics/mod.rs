use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector for one model instance.
///
/// Counts are mirrored in local atomics so tests and callers can read them
/// back without an exporter; the `metrics` facade receives the same values
/// for whatever recorder the application installs.
#[derive(Debug, Default)]
pub struct ModelMetrics {
    events_processed: AtomicU64,
    transactions_emitted: AtomicU64,
    snapshots_emitted: AtomicU64,
    book_notifications: AtomicU64,
    listener_faults: AtomicU64,
}

impl ModelMetrics {
    pub fn new() -> Self {
        // Register metric descriptions
        describe_counter!(
            "model_events_total",
            "Total number of raw indexed events processed"
        );
        describe_counter!(
            "model_batches_total",
            "Reconstructed transaction and snapshot batches delivered"
        );
        describe_counter!(
            "model_listener_faults_total",
            "Listener invocations that panicked and were dropped"
        );
        describe_counter!(
            "depth_notifications_total",
            "Order book change notifications fired"
        );
        describe_gauge!(
            "depth_published_levels",
            "Entries in the published book per side"
        );
        describe_histogram!(
            "depth_update_duration_seconds",
            "Duration of book update folding"
        );

        Self::default()
    }

    // Counter methods
    pub fn record_events(&self, count: usize) {
        self.events_processed
            .fetch_add(count as u64, Ordering::Relaxed);
        counter!("model_events_total").increment(count as u64);
    }

    pub fn record_transaction(&self) {
        self.transactions_emitted.fetch_add(1, Ordering::Relaxed);
        counter!("model_batches_total", "kind" => "transaction").increment(1);
    }

    pub fn record_snapshot(&self) {
        self.snapshots_emitted.fetch_add(1, Ordering::Relaxed);
        counter!("model_batches_total", "kind" => "snapshot").increment(1);
    }

    pub fn record_book_notification(&self) {
        self.book_notifications.fetch_add(1, Ordering::Relaxed);
        counter!("depth_notifications_total").increment(1);
    }

    pub fn record_listener_fault(&self) {
        self.listener_faults.fetch_add(1, Ordering::Relaxed);
        counter!("model_listener_faults_total").increment(1);
    }

    // Gauge methods
    pub fn set_published_levels(&self, buy: usize, sell: usize) {
        gauge!("depth_published_levels", "side" => "buy").set(buy as f64);
        gauge!("depth_published_levels", "side" => "sell").set(sell as f64);
    }

    pub fn record_update_duration(&self, duration: Duration) {
        histogram!("depth_update_duration_seconds").record(duration.as_secs_f64());
    }

    // Local readbacks
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    pub fn transactions(&self) -> u64 {
        self.transactions_emitted.load(Ordering::Relaxed)
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots_emitted.load(Ordering::Relaxed)
    }

    pub fn book_notifications(&self) -> u64 {
        self.book_notifications.load(Ordering::Relaxed)
    }

    pub fn listener_faults(&self) -> u64 {
        self.listener_faults.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = ModelMetrics::new();

        metrics.record_events(5);
        metrics.record_events(3);
        metrics.record_transaction();
        metrics.record_snapshot();
        metrics.record_book_notification();
        metrics.record_listener_fault();

        assert_eq!(metrics.events_processed(), 8);
        assert_eq!(metrics.transactions(), 1);
        assert_eq!(metrics.snapshots(), 1);
        assert_eq!(metrics.book_notifications(), 1);
        assert_eq!(metrics.listener_faults(), 1);
    }
}
