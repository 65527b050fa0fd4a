//! Already-decoded requests handed to the core by a protocol adapter.

use serde::{Deserialize, Serialize};

use crate::types::{OrderId, OrderType, Side, TimeInForce};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub security_id: String,
    pub client_order_id: String,
    pub sender_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: i64,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub stop_price: Option<i64>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    /// Iceberg cap; absent or zero shows the full remaining quantity.
    #[serde(default)]
    pub disclosed_qty: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub order_id: OrderId,
    pub original_client_order_id: String,
    pub security_id: String,
    pub client_order_id: String,
    pub sender_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: i64,
}

/// Cancel/replace request.
///
/// `qty` is the quantity the client still wants working and `cum_qty` the
/// cumulative fill the client has seen; the order's new total is their sum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRequest {
    pub order_id: OrderId,
    pub original_client_order_id: String,
    pub security_id: String,
    pub client_order_id: String,
    pub sender_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: i64,
    #[serde(default)]
    pub cum_qty: i64,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub stop_price: Option<i64>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    #[serde(default)]
    pub disclosed_qty: Option<i64>,
}
