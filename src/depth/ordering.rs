use std::cmp::Ordering;

use crate::events::{EventSource, Order, Scope, Side};

/// Sort key ranking live orders inside one book side.
///
/// Buy side ranks descending by price, sell side ascending; the tie-break
/// ladder is identical for both sides: individual orders before aggregated
/// ones, individual orders by ascending time then index, aggregated orders
/// by descending size, then ascending time, scope, exchange code, maker id
/// and index. The terminal source comparison keeps equal indices from
/// different sources distinct within one container.
#[derive(Debug, Clone)]
pub(crate) struct OrderKey {
    side: Side,
    price: u64,
    aggregated: bool,
    size: u64,
    time: u64,
    scope: Scope,
    exchange_code: char,
    maker_id: Option<String>,
    index: u64,
    source: EventSource,
}

impl OrderKey {
    pub fn for_order(order: &Order) -> Self {
        Self {
            side: order.side,
            price: order.price,
            aggregated: order.is_aggregated(),
            size: order.size,
            time: order.time,
            scope: order.scope,
            exchange_code: order.exchange_code,
            maker_id: order.maker_id.clone(),
            index: order.index,
            source: order.source.clone(),
        }
    }

    fn price_rank(&self, other: &Self) -> Ordering {
        match self.side {
            Side::Buy => other.price.cmp(&self.price),
            Side::Sell => self.price.cmp(&other.price),
        }
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        if self.aggregated {
            other
                .size
                .cmp(&self.size)
                .then_with(|| self.time.cmp(&other.time))
                .then_with(|| self.scope.cmp(&other.scope))
                .then_with(|| self.exchange_code.cmp(&other.exchange_code))
                .then_with(|| self.maker_id.cmp(&other.maker_id))
        } else {
            self.time.cmp(&other.time)
        }
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.price_rank(other)
            .then_with(|| self.aggregated.cmp(&other.aggregated))
            .then_with(|| self.tie_break(other))
            .then_with(|| self.index.cmp(&other.index))
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality must agree with the comparator: two keys ranking Equal identify
// the same container slot even when payload fields the tie-break ladder
// skips (e.g. size on individual orders) differ.
impl PartialEq for OrderKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderKey {}
