//! Contracts for the external feed collaborator.
//!
//! The engine performs no network I/O and decodes no wire formats; an
//! injected [`Feed`] pushes already-decoded typed events into the model and
//! accepts subscription commands. There is no process-wide default feed:
//! every model takes its feed handle at construction.

use std::sync::Arc;

/// Receiver of decoded event batches.
///
/// Invoked on the feed's dispatch thread(s). Events of the same source
/// within one callback are contiguous; no other batching boundary is
/// assumed.
pub trait EventListener<E>: Send + Sync {
    fn on_events(&self, events: &[E]);
}

impl<E, F> EventListener<E> for F
where
    F: Fn(&[E]) + Send + Sync,
{
    fn on_events(&self, events: &[E]) {
        self(events)
    }
}

/// A live subscription owned by one model.
pub trait FeedSubscription: Send {
    /// Replace the subscribed symbol set atomically.
    fn set_symbols(&mut self, symbols: Vec<String>);

    /// Tear the subscription down; no further events are delivered.
    fn close(&mut self);
}

/// Handle to the external feed engine.
pub trait Feed<E>: Send + Sync {
    /// Create a subscription delivering events to `listener`. The
    /// subscription starts with an empty symbol set.
    fn create_subscription(&self, listener: Arc<dyn EventListener<E>>) -> Box<dyn FeedSubscription>;
}
