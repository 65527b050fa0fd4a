//! API types for the REST and WebSocket interfaces.
//!
//! Enum fields arrive as strings (names or FIX tag values) and are
//! translated into the core request types, so a bad value becomes a
//! `TranslateError` rather than a body-parsing failure.

use std::sync::Arc;

use orderbook::{
    CancelRequest, ExecutionReport, MarketPicture, NewOrderRequest, OrderId, OrderType,
    ReplaceRequest, Side, TimeInForce, TranslateError,
};
use serde::{Deserialize, Serialize};

fn time_in_force(value: Option<&str>) -> Result<TimeInForce, TranslateError> {
    value.map_or(Ok(TimeInForce::Day), str::parse)
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderBody {
    pub security_id: String,
    pub client_order_id: String,
    pub sender_id: String,
    pub side: String,
    pub order_type: String,
    pub qty: i64,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub stop_price: Option<i64>,
    #[serde(default)]
    pub time_in_force: Option<String>,
    #[serde(default)]
    pub disclosed_qty: Option<i64>,
}

impl TryFrom<NewOrderBody> for NewOrderRequest {
    type Error = TranslateError;

    fn try_from(body: NewOrderBody) -> Result<Self, Self::Error> {
        Ok(NewOrderRequest {
            side: body.side.parse::<Side>()?,
            order_type: body.order_type.parse::<OrderType>()?,
            time_in_force: time_in_force(body.time_in_force.as_deref())?,
            security_id: body.security_id,
            client_order_id: body.client_order_id,
            sender_id: body.sender_id,
            qty: body.qty,
            price: body.price,
            stop_price: body.stop_price,
            disclosed_qty: body.disclosed_qty,
        })
    }
}

/// Body of `POST /orders/:id/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBody {
    pub original_client_order_id: String,
    pub security_id: String,
    pub client_order_id: String,
    pub sender_id: String,
    pub side: String,
    pub order_type: String,
    #[serde(default)]
    pub qty: i64,
}

impl CancelBody {
    pub fn into_request(self, order_id: OrderId) -> Result<CancelRequest, TranslateError> {
        Ok(CancelRequest {
            order_id,
            side: self.side.parse()?,
            order_type: self.order_type.parse()?,
            original_client_order_id: self.original_client_order_id,
            security_id: self.security_id,
            client_order_id: self.client_order_id,
            sender_id: self.sender_id,
            qty: self.qty,
        })
    }
}

/// Body of `POST /orders/:id/replace`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceBody {
    pub original_client_order_id: String,
    pub security_id: String,
    pub client_order_id: String,
    pub sender_id: String,
    pub side: String,
    pub order_type: String,
    /// Quantity still wanted working.
    pub qty: i64,
    /// Cumulative quantity the client has seen filled.
    #[serde(default)]
    pub cum_qty: i64,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub stop_price: Option<i64>,
    #[serde(default)]
    pub time_in_force: Option<String>,
    #[serde(default)]
    pub disclosed_qty: Option<i64>,
}

impl ReplaceBody {
    pub fn into_request(self, order_id: OrderId) -> Result<ReplaceRequest, TranslateError> {
        Ok(ReplaceRequest {
            order_id,
            side: self.side.parse()?,
            order_type: self.order_type.parse()?,
            time_in_force: time_in_force(self.time_in_force.as_deref())?,
            original_client_order_id: self.original_client_order_id,
            security_id: self.security_id,
            client_order_id: self.client_order_id,
            sender_id: self.sender_id,
            qty: self.qty,
            cum_qty: self.cum_qty,
            price: self.price,
            stop_price: self.stop_price,
            disclosed_qty: self.disclosed_qty,
        })
    }
}

/// Acknowledgement that a request reached its book. The outcome itself
/// arrives as an execution report.
#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub order_id: OrderId,
    pub status: String,
}

impl AcceptedResponse {
    pub fn accepted(order_id: OrderId) -> Self {
        Self {
            order_id,
            status: "accepted".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SecuritiesResponse {
    pub securities: Vec<String>,
}

/// Query of `/reports/stream`.
#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub sender_id: Option<String>,
}

/// WebSocket message types.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebSocketMessage {
    #[serde(rename = "report")]
    Report(ExecutionReport),
    #[serde(rename = "picture")]
    Picture(Arc<MarketPicture>),
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "ping")]
    Ping { timestamp: u128 },
    #[serde(rename = "pong")]
    Pong { timestamp: u128 },
}
