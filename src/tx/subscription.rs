use std::collections::BTreeSet;

use crate::events::EventSource;

/// Sentinel from-time meaning "not subscribed".
pub const FROM_TIME_UNSUBSCRIBED: u64 = u64::MAX;

/// Translates an indexed model's source-set configuration into concrete
/// subscription symbols.
#[derive(Debug)]
pub(crate) struct SourceSubscription {
    symbol: String,
    sources: BTreeSet<EventSource>,
}

impl SourceSubscription {
    pub fn new(symbol: String, sources: BTreeSet<EventSource>) -> Self {
        Self { symbol, sources }
    }

    /// The concrete symbol set: the bare symbol when no sources are
    /// configured (receive all sources), otherwise one decorated symbol per
    /// configured source.
    pub fn symbols(&self) -> Vec<String> {
        if self.sources.is_empty() {
            vec![self.symbol.clone()]
        } else {
            self.sources
                .iter()
                .map(|source| source.decorate(&self.symbol))
                .collect()
        }
    }

    /// Replace the source set. Returns `false` (a no-op) when the new set
    /// equals the current one.
    pub fn set_sources(&mut self, sources: BTreeSet<EventSource>) -> bool {
        if self.sources == sources {
            return false;
        }
        self.sources = sources;
        true
    }
}

/// Translates a time-series model's from-time configuration into concrete
/// subscription symbols.
#[derive(Debug)]
pub(crate) struct TimeSubscription {
    symbol: String,
    from_time: u64,
}

impl TimeSubscription {
    pub fn new(symbol: String, from_time: u64) -> Self {
        Self { symbol, from_time }
    }

    /// Empty while unsubscribed, otherwise a single symbol decorated with
    /// the from-time.
    pub fn symbols(&self) -> Vec<String> {
        if self.from_time == FROM_TIME_UNSUBSCRIBED {
            Vec::new()
        } else {
            vec![format!("{}{{fromTime={}}}", self.symbol, self.from_time)]
        }
    }

    /// Replace the from-time. Returns `false` (a no-op) when unchanged.
    pub fn set_from_time(&mut self, from_time: u64) -> bool {
        if self.from_time == from_time {
            return false;
        }
        self.from_time = from_time;
        true
    }
}
