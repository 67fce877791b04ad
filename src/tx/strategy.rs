use crate::events::IndexedEvent;

/// Whether same-kind transactions are coalesced into one listener call or
/// delivered one-by-one. Snapshots are never subject to this mode; they
/// always fire as their own notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Accumulate all transaction batches completed during one raw input
    /// list and flush them as a single listener call.
    #[default]
    Batch,
    /// Invoke the listener once per completed transaction.
    Notify,
}

/// Per-source transaction buffering for [`DeliveryMode::Batch`].
#[derive(Debug)]
pub(crate) struct DeliveryBuffer<E> {
    mode: DeliveryMode,
    buffered: Vec<E>,
}

impl<E: IndexedEvent> DeliveryBuffer<E> {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            mode,
            buffered: Vec::new(),
        }
    }

    /// Offer a completed transaction batch. Returns the events to deliver
    /// immediately, or `None` when they were absorbed into the buffer.
    pub fn offer(&mut self, mut events: Vec<E>) -> Option<Vec<E>> {
        match self.mode {
            DeliveryMode::Notify => Some(events),
            DeliveryMode::Batch => {
                self.buffered.append(&mut events);
                None
            }
        }
    }

    /// Drain everything buffered since the last flush.
    pub fn flush(&mut self) -> Option<Vec<E>> {
        if self.buffered.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buffered))
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.buffered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSource, Order, Side};

    fn order(index: u64) -> Order {
        Order::new("AAPL", EventSource::new("NTV"), index, Side::Buy, 100, 10)
    }

    #[test]
    fn test_notify_mode_delivers_immediately() {
        let mut buffer = DeliveryBuffer::new(DeliveryMode::Notify);
        let delivered = buffer.offer(vec![order(1), order(2)]).unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(buffer.flush().is_none());
    }

    #[test]
    fn test_batch_mode_accumulates_until_flush() {
        let mut buffer = DeliveryBuffer::new(DeliveryMode::Batch);

        assert!(buffer.offer(vec![order(1)]).is_none());
        assert!(buffer.offer(vec![order(2), order(3)]).is_none());
        assert_eq!(buffer.pending_count(), 3);

        let flushed = buffer.flush().unwrap();
        assert_eq!(flushed.len(), 3);
        assert!(buffer.flush().is_none());
    }

    #[test]
    fn test_flush_on_empty_buffer_is_none() {
        let mut buffer: DeliveryBuffer<Order> = DeliveryBuffer::new(DeliveryMode::Batch);
        assert!(buffer.flush().is_none());
    }
}
