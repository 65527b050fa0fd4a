//! A single order and its in-place state transitions.

use serde::Serialize;

use crate::error::{BookError, TranslateError};
use crate::request::{CancelRequest, NewOrderRequest, ReplaceRequest};
use crate::types::{OrderId, OrderType, Side, TimeInForce};

/// Result of applying a replace to a resting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Changes applied in place, queue position kept.
    Applied,
    /// Changes applied but the order must be re-sequenced at the back of
    /// its (possibly new) price level.
    PriorityLost,
}

/// An order as held by the book.
///
/// Identity and request attributes are public; fill state only moves
/// through [`Order::fill`] so that `filled_qty <= order_qty` always holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub security_id: String,
    pub client_order_id: String,
    pub original_client_order_id: String,
    /// Routing key for replies.
    pub sender_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub order_qty: i64,
    pub px_ticks: i64,
    pub stop_px: i64,
    pub disclosed_qty: i64,
    filled_qty: i64,
    fill_value: i64,
    last_px: i64,
    last_qty: i64,
}

/// Highest price, in ticks, a request may carry.
pub const MAX_PRICE: i64 = 1_000_000_000;
/// Largest order quantity a request may carry. Together with `MAX_PRICE`
/// this keeps `px * qty` inside `i64`.
pub const MAX_QTY: i64 = 1_000_000_000;

fn required(value: Option<i64>, field: &'static str) -> Result<i64, TranslateError> {
    let value = value.ok_or(TranslateError::MissingField(field))?;
    if (1..=MAX_PRICE).contains(&value) {
        Ok(value)
    } else {
        Err(TranslateError::PriceOutOfRange { field, value })
    }
}

fn bounded_qty(qty: i64) -> Result<i64, TranslateError> {
    // non-positive quantities are left to the book, which rejects them
    if qty > MAX_QTY {
        Err(TranslateError::QtyOutOfRange(qty))
    } else {
        Ok(qty)
    }
}

/// Limit-style types need a price, stop types a trigger price.
fn prices_for(
    order_type: OrderType,
    price: Option<i64>,
    stop_price: Option<i64>,
) -> Result<(i64, i64), TranslateError> {
    match order_type {
        OrderType::Market => Ok((0, 0)),
        OrderType::Limit => Ok((required(price, "price")?, 0)),
        OrderType::Stop => Ok((0, required(stop_price, "stop_price")?)),
        OrderType::StopLimit => Ok((
            required(price, "price")?,
            required(stop_price, "stop_price")?,
        )),
    }
}

impl Order {
    fn blank(
        id: OrderId,
        security_id: String,
        client_order_id: String,
        sender_id: String,
        side: Side,
        order_type: OrderType,
        order_qty: i64,
    ) -> Self {
        Self {
            id,
            security_id,
            client_order_id,
            original_client_order_id: String::new(),
            sender_id,
            side,
            order_type,
            time_in_force: TimeInForce::Day,
            order_qty,
            px_ticks: 0,
            stop_px: 0,
            disclosed_qty: 0,
            filled_qty: 0,
            fill_value: 0,
            last_px: 0,
            last_qty: 0,
        }
    }

    /// Builds a fresh order from a new-order request under a newly issued id.
    pub fn new_order(id: OrderId, req: NewOrderRequest) -> Result<Self, TranslateError> {
        let (px, stop) = prices_for(req.order_type, req.price, req.stop_price)?;
        bounded_qty(req.qty)?;
        let mut order = Self::blank(
            id,
            req.security_id,
            req.client_order_id,
            req.sender_id,
            req.side,
            req.order_type,
            req.qty,
        );
        order.px_ticks = px;
        order.stop_px = stop;
        order.time_in_force = req.time_in_force;
        order.disclosed_qty = req.disclosed_qty.unwrap_or(0);
        Ok(order)
    }

    /// Builds the lookup key for a cancel. Only id, identity and the
    /// type/side used for dispatch matter.
    pub fn cancel_request(req: CancelRequest) -> Self {
        let mut order = Self::blank(
            req.order_id,
            req.security_id,
            req.client_order_id,
            req.sender_id,
            req.side,
            req.order_type,
            req.qty,
        );
        order.original_client_order_id = req.original_client_order_id;
        order
    }

    /// Builds the replacement image, normalising quantity to the new total
    /// (`qty + cum_qty`).
    pub fn replace_request(req: ReplaceRequest) -> Result<Self, TranslateError> {
        let (px, stop) = prices_for(req.order_type, req.price, req.stop_price)?;
        if !(0..=MAX_QTY).contains(&req.cum_qty) {
            return Err(TranslateError::QtyOutOfRange(req.cum_qty));
        }
        let total = req
            .qty
            .checked_add(req.cum_qty)
            .ok_or(TranslateError::QtyOutOfRange(req.qty))
            .and_then(bounded_qty)?;
        let mut order = Self::blank(
            req.order_id,
            req.security_id,
            req.client_order_id,
            req.sender_id,
            req.side,
            req.order_type,
            total,
        );
        order.original_client_order_id = req.original_client_order_id;
        order.px_ticks = px;
        order.stop_px = stop;
        order.time_in_force = req.time_in_force;
        order.disclosed_qty = req.disclosed_qty.unwrap_or(0);
        Ok(order)
    }

    pub fn filled_qty(&self) -> i64 {
        self.filled_qty
    }

    /// Quantity not yet filled, ignoring any disclosure cap.
    pub fn actual_pending_qty(&self) -> i64 {
        self.order_qty - self.filled_qty
    }

    /// Quantity exposed to the book.
    pub fn pending_qty(&self) -> i64 {
        let actual = self.actual_pending_qty();
        if self.disclosed_qty > 0 && self.disclosed_qty < actual {
            self.disclosed_qty
        } else {
            actual
        }
    }

    /// Quantity-weighted mean of all fill prices, truncated to a tick.
    pub fn avg_px(&self) -> i64 {
        if self.filled_qty == 0 {
            0
        } else {
            self.fill_value / self.filled_qty
        }
    }

    pub fn last_px(&self) -> i64 {
        self.last_px
    }

    pub fn last_qty(&self) -> i64 {
        self.last_qty
    }

    pub fn is_filled(&self) -> bool {
        self.actual_pending_qty() == 0
    }

    /// Records an execution of `qty` at `px`.
    ///
    /// Callers size `qty` from `pending_qty`, so overfills are a bug.
    pub fn fill(&mut self, px: i64, qty: i64) {
        debug_assert!(qty > 0 && qty <= self.actual_pending_qty());
        let qty = qty.min(self.actual_pending_qty());
        self.fill_value += px * qty;
        self.last_px = px;
        self.last_qty = qty;
        self.filled_qty += qty;
    }

    /// Rolls the client order id forward to the one on `req`.
    pub fn cancel(&mut self, req: &Order) {
        self.original_client_order_id =
            std::mem::replace(&mut self.client_order_id, req.client_order_id.clone());
    }

    /// Applies a replace image.
    ///
    /// Quantities, disclosure, client id and time in force always follow
    /// the request. Moving to Market/Stop, or changing price, type or stop
    /// price, costs the order its queue position.
    pub fn replace(&mut self, req: &Order) -> Result<ReplaceOutcome, BookError> {
        if req.order_qty <= self.filled_qty {
            return Err(BookError::RejectReplace(
                "New order qty is less than filled qty".to_string(),
            ));
        }

        self.order_qty = req.order_qty;
        self.disclosed_qty = req.disclosed_qty;
        self.cancel(req);
        self.time_in_force = req.time_in_force;

        let mut lost_priority = false;
        if matches!(req.order_type, OrderType::Market | OrderType::Stop) {
            lost_priority = true;
        } else if self.px_ticks != req.px_ticks {
            lost_priority = true;
            self.px_ticks = req.px_ticks;
        }

        if self.order_type != req.order_type {
            lost_priority = true;
            self.order_type = req.order_type;
        }

        if self.stop_px != req.stop_px {
            lost_priority = true;
            self.stop_px = req.stop_px;
        }

        Ok(if lost_priority {
            ReplaceOutcome::PriorityLost
        } else {
            ReplaceOutcome::Applied
        })
    }

    /// Stop-limit becomes limit, stop becomes market. One way only.
    pub fn trigger(&mut self) {
        match self.order_type {
            OrderType::StopLimit => self.order_type = OrderType::Limit,
            OrderType::Stop => self.order_type = OrderType::Market,
            OrderType::Market | OrderType::Limit => {}
        }
    }

    /// Re-rests an unfilled market remainder as a limit at `px`.
    pub fn set_market_to_limit(&mut self, px: i64) {
        self.order_type = OrderType::Limit;
        self.px_ticks = px;
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn request(side: Side, order_type: OrderType, qty: i64) -> NewOrderRequest {
        NewOrderRequest {
            security_id: "500112".into(),
            client_order_id: "c1".into(),
            sender_id: "FIX.4.2:CLIENT->ESM".into(),
            side,
            order_type,
            qty,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::Day,
            disclosed_qty: None,
        }
    }

    pub fn limit(id: u64, side: Side, px: i64, qty: i64) -> Order {
        let mut req = request(side, OrderType::Limit, qty);
        req.price = Some(px);
        req.client_order_id = format!("c{id}");
        Order::new_order(OrderId(id), req).unwrap()
    }

    pub fn market(id: u64, side: Side, qty: i64) -> Order {
        let mut req = request(side, OrderType::Market, qty);
        req.client_order_id = format!("c{id}");
        Order::new_order(OrderId(id), req).unwrap()
    }

    pub fn stop(id: u64, side: Side, stop_px: i64, qty: i64) -> Order {
        let mut req = request(side, OrderType::Stop, qty);
        req.stop_price = Some(stop_px);
        req.client_order_id = format!("c{id}");
        Order::new_order(OrderId(id), req).unwrap()
    }

    pub fn stop_limit(id: u64, side: Side, stop_px: i64, px: i64, qty: i64) -> Order {
        let mut req = request(side, OrderType::StopLimit, qty);
        req.stop_price = Some(stop_px);
        req.price = Some(px);
        req.client_order_id = format!("c{id}");
        Order::new_order(OrderId(id), req).unwrap()
    }

    pub fn ioc(mut order: Order) -> Order {
        order.time_in_force = TimeInForce::ImmediateOrCancel;
        order
    }

    /// Replace image of `resting` with new total quantity, price and type.
    pub fn amend(resting: &Order, qty: i64, px: i64, order_type: OrderType) -> Order {
        let mut req = resting.clone();
        req.original_client_order_id = resting.client_order_id.clone();
        req.client_order_id = format!("{}-r", resting.client_order_id);
        req.order_qty = qty;
        req.px_ticks = px;
        req.order_type = order_type;
        req.filled_qty = 0;
        req.fill_value = 0;
        req
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fill_tracks_average_and_last() {
        let mut o = limit(1, Side::Buy, 100, 30);
        o.fill(100, 10);
        o.fill(106, 20);

        assert_eq!(o.filled_qty(), 30);
        assert_eq!(o.avg_px(), 104);
        assert_eq!(o.last_px(), 106);
        assert_eq!(o.last_qty(), 20);
        assert!(o.is_filled());
        assert_eq!(o.pending_qty(), 0);
    }

    #[test]
    fn disclosed_qty_caps_pending() {
        let mut req = request(Side::Sell, OrderType::Limit, 100);
        req.price = Some(50);
        req.disclosed_qty = Some(20);
        let mut o = Order::new_order(OrderId(7), req).unwrap();

        assert_eq!(o.pending_qty(), 20);
        assert_eq!(o.actual_pending_qty(), 100);

        o.fill(50, 20);
        assert_eq!(o.pending_qty(), 20, "next slice is shown after a fill");

        o.fill(50, 70);
        assert_eq!(o.pending_qty(), 10);
        assert_eq!(o.actual_pending_qty(), 10);
    }

    #[test]
    fn missing_prices_are_rejected() {
        let req = request(Side::Buy, OrderType::Limit, 10);
        assert_eq!(
            Order::new_order(OrderId(1), req),
            Err(TranslateError::MissingField("price"))
        );

        let mut req = request(Side::Buy, OrderType::StopLimit, 10);
        req.price = Some(10);
        assert_eq!(
            Order::new_order(OrderId(1), req),
            Err(TranslateError::MissingField("stop_price"))
        );
    }

    #[test]
    fn replace_request_adds_cumulative_fill() {
        let req = ReplaceRequest {
            order_id: OrderId(9),
            original_client_order_id: "c9".into(),
            security_id: "500112".into(),
            client_order_id: "c9-r".into(),
            sender_id: "s".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            qty: 40,
            cum_qty: 60,
            price: Some(101),
            stop_price: None,
            time_in_force: TimeInForce::Day,
            disclosed_qty: None,
        };
        let o = Order::replace_request(req).unwrap();
        assert_eq!(o.order_qty, 100);
        assert_eq!(o.original_client_order_id, "c9");
        assert_eq!(o.px_ticks, 101);
    }

    #[test]
    fn out_of_range_prices_are_rejected() {
        let mut req = request(Side::Sell, OrderType::Limit, 3);
        req.price = Some(i64::MAX / 2);
        assert_eq!(
            Order::new_order(OrderId(1), req),
            Err(TranslateError::PriceOutOfRange { field: "price", value: i64::MAX / 2 })
        );

        let mut req = request(Side::Buy, OrderType::Limit, 3);
        req.price = Some(0);
        assert!(matches!(
            Order::new_order(OrderId(1), req),
            Err(TranslateError::PriceOutOfRange { field: "price", .. })
        ));

        let mut req = request(Side::Sell, OrderType::Stop, 3);
        req.stop_price = Some(-5);
        assert!(matches!(
            Order::new_order(OrderId(1), req),
            Err(TranslateError::PriceOutOfRange { field: "stop_price", .. })
        ));

        let mut req = request(Side::Buy, OrderType::Limit, MAX_QTY);
        req.price = Some(MAX_PRICE);
        let o = Order::new_order(OrderId(1), req).unwrap();
        assert_eq!((o.px_ticks, o.order_qty), (MAX_PRICE, MAX_QTY));
    }

    #[test]
    fn oversized_qty_is_rejected() {
        let mut req = request(Side::Buy, OrderType::Limit, MAX_QTY + 1);
        req.price = Some(50);
        assert_eq!(
            Order::new_order(OrderId(1), req),
            Err(TranslateError::QtyOutOfRange(MAX_QTY + 1))
        );
    }

    #[test]
    fn replace_total_must_fit() {
        let replace = |qty: i64, cum_qty: i64| ReplaceRequest {
            order_id: OrderId(9),
            original_client_order_id: "c9".into(),
            security_id: "500112".into(),
            client_order_id: "c9-r".into(),
            sender_id: "s".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            qty,
            cum_qty,
            price: Some(101),
            stop_price: None,
            time_in_force: TimeInForce::Day,
            disclosed_qty: None,
        };

        assert_eq!(
            Order::replace_request(replace(i64::MAX, 1)),
            Err(TranslateError::QtyOutOfRange(i64::MAX))
        );
        assert_eq!(
            Order::replace_request(replace(MAX_QTY, 1)),
            Err(TranslateError::QtyOutOfRange(MAX_QTY + 1))
        );
        assert_eq!(
            Order::replace_request(replace(10, -1)),
            Err(TranslateError::QtyOutOfRange(-1))
        );
        assert_eq!(Order::replace_request(replace(MAX_QTY - 5, 5)).unwrap().order_qty, MAX_QTY);
    }

    #[test]
    fn largest_fill_stays_in_range() {
        let mut req = request(Side::Buy, OrderType::Limit, MAX_QTY);
        req.price = Some(MAX_PRICE);
        let mut o = Order::new_order(OrderId(1), req).unwrap();
        o.fill(MAX_PRICE, MAX_QTY);
        assert_eq!(o.avg_px(), MAX_PRICE);
    }

    #[test]
    fn cancel_rolls_client_order_id() {
        let mut o = limit(1, Side::Buy, 100, 10);
        let mut req = o.clone();
        req.client_order_id = "c1-x".into();

        o.cancel(&req);
        assert_eq!(o.client_order_id, "c1-x");
        assert_eq!(o.original_client_order_id, "c1");
    }

    #[test]
    fn replace_same_price_keeps_priority() {
        let mut o = limit(1, Side::Buy, 100, 10);
        let req = amend(&o, 25, 100, OrderType::Limit);

        assert_eq!(o.replace(&req), Ok(ReplaceOutcome::Applied));
        assert_eq!(o.order_qty, 25);
        assert_eq!(o.client_order_id, "c1-r");
        assert_eq!(o.original_client_order_id, "c1");
    }

    #[test]
    fn replace_price_or_type_loses_priority() {
        let mut o = limit(1, Side::Buy, 100, 10);
        let req = amend(&o, 10, 99, OrderType::Limit);
        assert_eq!(o.replace(&req), Ok(ReplaceOutcome::PriorityLost));
        assert_eq!(o.px_ticks, 99);

        let mut o = limit(2, Side::Buy, 100, 10);
        let req = amend(&o, 10, 100, OrderType::Market);
        assert_eq!(o.replace(&req), Ok(ReplaceOutcome::PriorityLost));
        assert_eq!(o.order_type, OrderType::Market);
        assert_eq!(o.px_ticks, 100, "market replace leaves the price alone");

        let mut o = stop_limit(3, Side::Sell, 90, 89, 10);
        let mut req = amend(&o, 10, 89, OrderType::StopLimit);
        req.stop_px = 91;
        assert_eq!(o.replace(&req), Ok(ReplaceOutcome::PriorityLost));
        assert_eq!(o.stop_px, 91);
    }

    #[test]
    fn replace_below_filled_is_rejected_untouched() {
        let mut o = limit(1, Side::Buy, 100, 50);
        o.fill(100, 30);
        let before = o.clone();

        let req = amend(&o, 30, 120, OrderType::Limit);
        assert!(matches!(o.replace(&req), Err(BookError::RejectReplace(_))));
        assert_eq!(o, before);
    }

    #[test]
    fn trigger_is_one_way() {
        let mut s = stop(1, Side::Buy, 60, 10);
        s.trigger();
        assert_eq!(s.order_type, OrderType::Market);
        s.trigger();
        assert_eq!(s.order_type, OrderType::Market);

        let mut sl = stop_limit(2, Side::Sell, 40, 39, 10);
        sl.trigger();
        assert_eq!(sl.order_type, OrderType::Limit);
    }

    #[test]
    fn market_to_limit_sets_price() {
        let mut m = market(1, Side::Sell, 10);
        m.set_market_to_limit(77);
        assert_eq!(m.order_type, OrderType::Limit);
        assert_eq!(m.px_ticks, 77);
    }

    proptest! {
        #[test]
        fn fills_stay_within_order_qty(
            total in 1i64..10_000,
            fills in prop::collection::vec((1i64..500, 1i64..2_000), 1..40),
        ) {
            let mut o = limit(1, Side::Buy, 1, total);
            let mut value = 0i64;
            let mut qty_sum = 0i64;

            for (px, want) in fills {
                let qty = want.min(o.actual_pending_qty());
                if qty == 0 {
                    break;
                }
                o.fill(px, qty);
                value += px * qty;
                qty_sum += qty;

                prop_assert!(o.filled_qty() >= 0);
                prop_assert!(o.filled_qty() <= o.order_qty);
                prop_assert_eq!(o.avg_px(), value / qty_sum);
            }
        }
    }
}
