use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;

use crate::error::BookError;
use crate::order::{Order, ReplaceOutcome};
use crate::types::OrderId;

/// Number of distinct price levels published per side.
pub const DEPTH: usize = 5;

// Price-time ordered orders for one side of one book.
// The ordering parameter decides which end of the tree is "best":
// - Ascending: lowest price first (sells, stop-buys)
// - Descending: highest price first (buys, stop-sells)
// Within a price, the insertion sequence keeps FIFO intact.

pub trait PriceOrder {
    type Key: Ord + Copy + std::fmt::Debug;

    fn key(px: i64) -> Self::Key;
}

#[derive(Debug)]
pub struct Ascending;

#[derive(Debug)]
pub struct Descending;

impl PriceOrder for Ascending {
    type Key = i64;

    fn key(px: i64) -> i64 {
        px
    }
}

impl PriceOrder for Descending {
    type Key = Reverse<i64>;

    fn key(px: i64) -> Reverse<i64> {
        Reverse(px)
    }
}

/// Top-of-book aggregation, best level first, zero-filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarketData {
    pub price: [i64; DEPTH],
    pub qty: [i64; DEPTH],
}

#[derive(Debug)]
struct Slot<K> {
    position: (K, u64),
    order: Order,
}

#[derive(Debug)]
pub struct OrderList<O: PriceOrder> {
    /// (price key, arrival sequence) -> order id
    by_price: BTreeMap<(O::Key, u64), OrderId>,
    /// Owns the orders; the price index only holds ids
    by_id: HashMap<OrderId, Slot<O::Key>>,
    next_seq: u64,
    _ordering: PhantomData<O>,
}

pub type AscOrderList = OrderList<Ascending>;
pub type DescOrderList = OrderList<Descending>;

impl<O: PriceOrder> OrderList<O> {
    pub fn new() -> Self {
        Self {
            by_price: BTreeMap::new(),
            by_id: HashMap::new(),
            next_seq: 0,
            _ordering: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.by_id.get(id).map(|slot| &slot.order)
    }

    /// Best-priced, earliest order. `None` when the list is empty.
    pub fn first(&self) -> Option<&Order> {
        let (_, id) = self.by_price.first_key_value()?;
        self.get(id)
    }

    /// Orders best first.
    pub fn iter(&self) -> impl Iterator<Item = &Order> + '_ {
        self.by_price
            .values()
            .filter_map(move |id| self.by_id.get(id).map(|slot| &slot.order))
    }

    /// Queues `order` behind everything already resting at `px`.
    pub fn insert(&mut self, px: i64, order: Order) {
        let position = (O::key(px), self.next_seq);
        self.next_seq += 1;

        // an id already in the list is re-sequenced, never duplicated
        if let Some(old) = self.by_id.remove(&order.id) {
            self.by_price.remove(&old.position);
        }
        self.by_price.insert(position, order.id);
        self.by_id.insert(order.id, Slot { position, order });
    }

    /// Removes the order named by `req`, rolling its client id forward.
    pub fn cancel(&mut self, req: &Order) -> Result<Order, BookError> {
        let mut order = self.erase(&req.id)?;
        order.cancel(req);
        Ok(order)
    }

    /// Applies a replace in place. The price index is left untouched, so a
    /// `PriorityLost` outcome obliges the caller to erase and re-insert.
    pub fn replace(&mut self, req: &Order) -> Result<ReplaceOutcome, BookError> {
        let slot = self
            .by_id
            .get_mut(&req.id)
            .ok_or(BookError::OrderIdNotFound(req.id))?;
        slot.order.replace(req)
    }

    pub fn erase(&mut self, id: &OrderId) -> Result<Order, BookError> {
        let slot = self
            .by_id
            .remove(id)
            .ok_or(BookError::OrderIdNotFound(*id))?;
        self.by_price.remove(&slot.position);
        Ok(slot.order)
    }

    pub fn pop_first(&mut self) -> Option<Order> {
        let (_, id) = self.by_price.pop_first()?;
        self.by_id.remove(&id).map(|slot| slot.order)
    }

    /// Fills the first order and drops it once nothing is left to show.
    /// Returns the order as it stands after the fill.
    pub fn fill(&mut self, px: i64, qty: i64) -> Option<Order> {
        let (_, id) = self.by_price.first_key_value()?;
        let id = *id;
        let slot = self.by_id.get_mut(&id)?;
        slot.order.fill(px, qty);

        if slot.order.pending_qty() == 0 {
            self.erase(&id).ok()
        } else {
            Some(slot.order.clone())
        }
    }

    /// Aggregates pending quantity over the best `DEPTH` distinct prices.
    pub fn market_depth(&self) -> MarketData {
        let mut data = MarketData::default();
        let mut level: Option<usize> = None;

        for order in self.iter() {
            match level {
                Some(i) if data.price[i] == order.px_ticks => {
                    data.qty[i] += order.pending_qty();
                }
                _ => {
                    let next = level.map_or(0, |i| i + 1);
                    if next == DEPTH {
                        break;
                    }
                    data.price[next] = order.px_ticks;
                    data.qty[next] = order.pending_qty();
                    level = Some(next);
                }
            }
        }
        data
    }
}

impl<O: PriceOrder> Default for OrderList<O> {
    fn default() -> Self {
        Self::new()
    }
}
