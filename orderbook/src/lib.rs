//! Exchange order book with price-time priority matching.
//!
//! Core features:
//! - Market, limit, stop and stop-limit orders on buy, sell and short-sell
//! - Price-time priority matching at the resting order's price
//! - Immediate-or-cancel and iceberg (disclosed quantity) handling
//! - Cascading stop triggers after every trade
//! - Running market picture (OHLC, volume, top-5 depth) per security

pub mod error;
pub mod id;
pub mod order;
pub mod order_list;
pub mod reply;
pub mod request;
pub mod snapshot;
pub mod types;

use std::sync::Arc;

use tracing::{debug, info};

pub use error::{BookError, TranslateError};
pub use id::OrderIdGenerator;
pub use order::{Order, ReplaceOutcome, MAX_PRICE, MAX_QTY};
pub use order_list::{AscOrderList, DescOrderList, MarketData, OrderList, PriceOrder, DEPTH};
pub use reply::{EventLog, ExecKind, ExecutionReport, NullSink, ReplySink};
pub use request::{CancelRequest, NewOrderRequest, ReplaceRequest};
pub use snapshot::{Depth, MarketPicture, MarketPictureRecord, Trend, MAX_RECORDS};
pub use types::{OrderId, OrderType, Side, TimeInForce};

pub const REASON_CANCELLED: &str = "order cancelled";
pub const REASON_IOC: &str = "IOC order cancelled";
pub const REASON_NO_LAST_TRADE: &str = "market order cancelled, no last traded price";
pub const REASON_SHUTDOWN: &str = "order cancelled as system is shutting down";
pub const REASON_CLOSED_NEW: &str = "new orders are not accepted while the market is closed";
pub const REASON_CLOSED_REPLACE: &str = "replaces are not accepted while the market is closed";
pub const REASON_BAD_QTY: &str = "order qty must be positive";

/// Number of orders in each of a book's four lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RestingOrders {
    pub buys: usize,
    pub sells: usize,
    pub stop_buys: usize,
    pub stop_sells: usize,
}

/// Where a successful replace left the order.
enum Replaced {
    /// Still queued where it was.
    InPlace(Order),
    /// Pulled out of its list, must be routed again.
    Moved(Order),
}

/// Replace against the live list first, then the stop list of the same side.
fn apply_replace<L: PriceOrder, S: PriceOrder>(
    live: &mut OrderList<L>,
    stops: &mut OrderList<S>,
    req: &Order,
) -> Result<Replaced, BookError> {
    let missing = BookError::OrderIdNotFound(req.id);
    match live.replace(req) {
        Ok(ReplaceOutcome::Applied) => {
            return live.get(&req.id).cloned().map(Replaced::InPlace).ok_or(missing)
        }
        Ok(ReplaceOutcome::PriorityLost) => return live.erase(&req.id).map(Replaced::Moved),
        Err(BookError::OrderIdNotFound(_)) => {}
        Err(e) => return Err(e),
    }

    match stops.replace(req)? {
        ReplaceOutcome::Applied => stops.get(&req.id).cloned().map(Replaced::InPlace).ok_or(missing),
        ReplaceOutcome::PriorityLost => stops.erase(&req.id).map(Replaced::Moved),
    }
}

/// Parked list a trigger check is working through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopSide {
    Buys,
    Sells,
}

/// Pending work while an incoming order is being executed.
enum Step {
    /// Trade this order once more, or rest what is left of it.
    Match(Order),
    /// Look for parked stops reached by the last trade.
    Check(StopSide),
}

fn cancel_all<O: PriceOrder>(list: &mut OrderList<O>, replies: &dyn ReplySink) -> usize {
    let mut cancelled = 0;
    while let Some(order) = list.pop_first() {
        replies.cancel_confirm(&order, REASON_SHUTDOWN);
        cancelled += 1;
    }
    cancelled
}

/// Order book for one security.
///
/// Owns the live buy/sell lists, the parked stop-buy/stop-sell lists and the
/// running market picture. Every event goes out through the reply sink.
/// Not thread-safe - the market wraps each book in a mutex.
pub struct OrderBook {
    security_id: String,
    /// Buy orders, highest price first
    buys: DescOrderList,
    /// Sell orders, lowest price first
    sells: AscOrderList,
    /// Stop buys keyed by stop price, lowest first (next to trigger on a rise)
    stop_buys: AscOrderList,
    /// Stop sells keyed by stop price, highest first (next to trigger on a fall)
    stop_sells: DescOrderList,
    record: MarketPictureRecord,
    replies: Arc<dyn ReplySink>,
    has_changed: bool,
    is_active: bool,
}

impl OrderBook {
    /// Creates an empty book whose reference prices and circuit limits are
    /// seeded from the security's first order.
    pub fn new(replies: Arc<dyn ReplySink>, first: &Order) -> Self {
        info!(security = %first.security_id, px = first.px_ticks, "order book created");
        Self {
            security_id: first.security_id.clone(),
            buys: DescOrderList::new(),
            sells: AscOrderList::new(),
            stop_buys: AscOrderList::new(),
            stop_sells: DescOrderList::new(),
            record: MarketPictureRecord::seeded(first.security_id.clone(), first.px_ticks),
            replies,
            has_changed: false,
            is_active: true,
        }
    }

    pub fn security_id(&self) -> &str {
        &self.security_id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// True when anything happened since the last
    /// [`market_picture_record`](Self::market_picture_record).
    pub fn has_changed(&self) -> bool {
        self.has_changed
    }

    pub fn best_bid(&self) -> Option<i64> {
        self.buys.first().map(|o| o.px_ticks)
    }

    pub fn best_ask(&self) -> Option<i64> {
        self.sells.first().map(|o| o.px_ticks)
    }

    pub fn last_trade_px(&self) -> i64 {
        self.record.last_trade_px
    }

    pub fn resting_orders(&self) -> RestingOrders {
        RestingOrders {
            buys: self.buys.len(),
            sells: self.sells.len(),
            stop_buys: self.stop_buys.len(),
            stop_sells: self.stop_sells.len(),
        }
    }

    pub fn buys(&self) -> &DescOrderList {
        &self.buys
    }

    pub fn sells(&self) -> &AscOrderList {
        &self.sells
    }

    pub fn stop_buys(&self) -> &AscOrderList {
        &self.stop_buys
    }

    pub fn stop_sells(&self) -> &DescOrderList {
        &self.stop_sells
    }

    /// Accepts a new order: confirms it, then matches, rests or parks it.
    pub fn insert(&mut self, order: Order) {
        if !self.is_active {
            self.replies.new_reject(&order, REASON_CLOSED_NEW);
            return;
        }
        if order.order_qty <= 0 {
            self.replies.new_reject(&order, REASON_BAD_QTY);
            return;
        }

        self.replies.new_confirm(&order);
        self.route(order);
        self.has_changed = true;
    }

    /// Applies a cancel/replace image to a resting or parked order.
    pub fn replace(&mut self, req: Order) {
        if !self.is_active {
            self.replies.replace_reject(&req, REASON_CLOSED_REPLACE);
            return;
        }

        let result = if req.side.is_buy() {
            apply_replace(&mut self.buys, &mut self.stop_buys, &req)
        } else {
            apply_replace(&mut self.sells, &mut self.stop_sells, &req)
        };

        match result {
            Ok(Replaced::InPlace(order)) => {
                self.replies.replace_confirm(&order);
                if order.time_in_force == TimeInForce::ImmediateOrCancel {
                    self.cancel_ioc_in_place(&order.id, order.side);
                }
            }
            // re-routing handles IOC itself
            Ok(Replaced::Moved(order)) => {
                self.replies.replace_confirm(&order);
                self.route(order);
            }
            Err(e) => {
                self.replies.replace_reject(&req, &e.to_string());
                return;
            }
        }
        self.has_changed = true;
    }

    /// Cancels the order named by `req`. Accepted while the market is
    /// stopped.
    pub fn cancel(&mut self, req: Order) {
        // a triggered stop now lives in the live list and vice versa
        let result = match (req.side.is_buy(), req.order_type.is_stop()) {
            (true, false) => self.buys.cancel(&req).or_else(|_| self.stop_buys.cancel(&req)),
            (true, true) => self.stop_buys.cancel(&req).or_else(|_| self.buys.cancel(&req)),
            (false, false) => self.sells.cancel(&req).or_else(|_| self.stop_sells.cancel(&req)),
            (false, true) => self.stop_sells.cancel(&req).or_else(|_| self.sells.cancel(&req)),
        };

        match result {
            Ok(order) => {
                self.replies.cancel_confirm(&order, REASON_CANCELLED);
                self.has_changed = true;
            }
            Err(e) => self.replies.cancel_reject(&req, &e.to_string()),
        }
    }

    /// Resumes accepting new orders and replaces.
    pub fn start(&mut self) {
        self.is_active = true;
        info!(security = %self.security_id, "order book started");
    }

    /// Stops accepting new orders and replaces and cancels everything
    /// resting or parked.
    pub fn stop(&mut self) {
        self.is_active = false;

        let replies = self.replies.as_ref();
        let cancelled = cancel_all(&mut self.buys, replies)
            + cancel_all(&mut self.sells, replies)
            + cancel_all(&mut self.stop_buys, replies)
            + cancel_all(&mut self.stop_sells, replies);

        self.has_changed = true;
        info!(security = %self.security_id, cancelled, "order book stopped");
    }

    /// Refreshes top-5 depth into the record and clears the change flag.
    pub fn market_picture_record(&mut self) -> &MarketPictureRecord {
        self.record
            .set_depth(&self.buys.market_depth(), &self.sells.market_depth());
        self.has_changed = false;
        &self.record
    }

    /// Current picture without touching the change flag.
    pub fn picture(&self) -> MarketPictureRecord {
        let mut record = self.record.clone();
        record.set_depth(&self.buys.market_depth(), &self.sells.market_depth());
        record
    }

    fn route(&mut self, order: Order) {
        match (order.side.is_buy(), order.order_type.is_stop()) {
            (_, false) => self.execute(order),
            (true, true) => self.insert_stop_buy(order),
            (false, true) => self.insert_stop_sell(order),
        }
    }

    /// Matches `order` and works off every stop its trades set off.
    ///
    /// Runs on an explicit stack so a cascade of any length costs heap, not
    /// call stack. After each trade the parked stops are checked before the
    /// trading order continues (stop buys first), and a triggered stop
    /// matches to completion before the check resumes.
    fn execute(&mut self, order: Order) {
        let mut stack = vec![Step::Match(order)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Match(mut order) => {
                    if self.match_once(&mut order) {
                        stack.push(Step::Match(order));
                        stack.push(Step::Check(StopSide::Buys));
                    } else if order.actual_pending_qty() > 0 {
                        self.rest_remainder(order);
                    }
                }
                Step::Check(from) => {
                    if let Some((side, triggered)) = self.next_triggered(from) {
                        stack.push(Step::Check(side));
                        stack.push(Step::Match(triggered));
                    }
                }
            }
        }
    }

    /// Trades `order` once against the best contra order, at the resting
    /// order's price. Returns false when nothing could trade.
    fn match_once(&mut self, order: &mut Order) -> bool {
        if order.pending_qty() <= 0 {
            return false;
        }

        let (px, qty, buy_id, sell_id) = if order.side.is_buy() {
            let Some(best) = self.sells.first() else {
                return false; // No sells available
            };
            if order.order_type != OrderType::Market && order.px_ticks < best.px_ticks {
                return false; // No cross - bid too low
            }

            let px = best.px_ticks;
            let qty = order.pending_qty().min(best.pending_qty());
            let Some(sell) = self.sells.fill(px, qty) else {
                return false;
            };
            order.fill(px, qty);
            self.replies.fill_confirm(&sell);
            self.replies.fill_confirm(order);
            (px, qty, order.id, sell.id)
        } else {
            let Some(best) = self.buys.first() else {
                return false; // No buys available
            };
            if order.order_type != OrderType::Market && order.px_ticks > best.px_ticks {
                return false; // No cross - ask too high
            }

            let px = best.px_ticks;
            let qty = order.pending_qty().min(best.pending_qty());
            let Some(buy) = self.buys.fill(px, qty) else {
                return false;
            };
            order.fill(px, qty);
            self.replies.fill_confirm(&buy);
            self.replies.fill_confirm(order);
            (px, qty, buy.id, order.id)
        };

        debug!(
            security = %self.security_id,
            px,
            qty,
            buy = %buy_id,
            sell = %sell_id,
            "trade"
        );
        self.record.record_trade(px, qty);
        true
    }

    /// Whatever did not match: IOC is cancelled, market is restated as a
    /// limit at the last traded price (or cancelled without one), the rest
    /// joins its side of the book.
    fn rest_remainder(&mut self, mut order: Order) {
        if order.time_in_force == TimeInForce::ImmediateOrCancel {
            self.replies.cancel_confirm(&order, REASON_IOC);
            return;
        }

        if order.order_type == OrderType::Market {
            let last_px = self.record.last_trade_px;
            if last_px <= 0 {
                self.replies.cancel_confirm(&order, REASON_NO_LAST_TRADE);
                return;
            }
            order.set_market_to_limit(last_px);
            self.replies.market_to_limit(&order);
        }

        if order.side.is_buy() {
            self.buys.insert(order.px_ticks, order);
        } else {
            self.sells.insert(order.px_ticks, order);
        }
    }

    fn insert_stop_buy(&mut self, mut order: Order) {
        if self.record.has_traded() && self.record.last_trade_px >= order.stop_px {
            order.trigger();
            self.replies.triggered(&order);
            self.execute(order);
        } else {
            self.stop_buys.insert(order.stop_px, order);
        }
    }

    fn insert_stop_sell(&mut self, mut order: Order) {
        if self.record.has_traded() && self.record.last_trade_px <= order.stop_px {
            order.trigger();
            self.replies.triggered(&order);
            self.execute(order);
        } else {
            self.stop_sells.insert(order.stop_px, order);
        }
    }

    /// Releases the next parked stop the last trade has reached. Stop buys
    /// go first; a check that has moved on to stop sells stays there.
    fn next_triggered(&mut self, from: StopSide) -> Option<(StopSide, Order)> {
        let last_px = self.record.last_trade_px;

        if from == StopSide::Buys
            && self.stop_buys.first().is_some_and(|stop| last_px >= stop.stop_px)
        {
            if let Some(mut order) = self.stop_buys.pop_first() {
                order.trigger();
                debug!(security = %self.security_id, order = %order.id, last_px, "stop buy triggered");
                self.replies.triggered(&order);
                return Some((StopSide::Buys, order));
            }
        }

        if self.stop_sells.first().is_some_and(|stop| last_px <= stop.stop_px) {
            let mut order = self.stop_sells.pop_first()?;
            order.trigger();
            debug!(security = %self.security_id, order = %order.id, last_px, "stop sell triggered");
            self.replies.triggered(&order);
            return Some((StopSide::Sells, order));
        }

        None
    }

    fn cancel_ioc_in_place(&mut self, id: &OrderId, side: Side) {
        let removed = if side.is_buy() {
            self.buys.erase(id)
        } else {
            self.sells.erase(id)
        };
        if let Ok(order) = removed {
            self.replies.cancel_confirm(&order, REASON_IOC);
        }
    }
}
