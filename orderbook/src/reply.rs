//! Outbound execution reports and the sink the book emits them through.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::order::Order;
use crate::types::{OrderId, OrderType, Side};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecKind {
    New,
    Replaced,
    Cancelled,
    Rejected,
    ReplaceRejected,
    CancelRejected,
    /// Market remainder restated as a limit.
    Restated,
    Triggered,
    PartialFill,
    Fill,
}

/// Image of an order at the moment of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub kind: ExecKind,
    pub order_id: OrderId,
    pub client_order_id: String,
    pub original_client_order_id: String,
    pub security_id: String,
    pub sender_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: i64,
    pub leaves_qty: i64,
    pub cum_qty: i64,
    pub avg_px: i64,
    pub last_px: i64,
    pub last_qty: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ExecutionReport {
    pub fn from_order(kind: ExecKind, order: &Order, text: Option<&str>) -> Self {
        Self {
            kind,
            order_id: order.id,
            client_order_id: order.client_order_id.clone(),
            original_client_order_id: order.original_client_order_id.clone(),
            security_id: order.security_id.clone(),
            sender_id: order.sender_id.clone(),
            side: order.side,
            order_type: order.order_type,
            price: order.px_ticks,
            leaves_qty: order.actual_pending_qty(),
            cum_qty: order.filled_qty(),
            avg_px: order.avg_px(),
            last_px: order.last_px(),
            last_qty: order.last_qty(),
            text: text.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }
}

/// Receives one call per order event. Implementations must not block:
/// the book calls in while holding its lock.
pub trait ReplySink: Send + Sync {
    fn send(&self, report: ExecutionReport);

    fn new_confirm(&self, order: &Order) {
        self.send(ExecutionReport::from_order(ExecKind::New, order, None));
    }

    fn replace_confirm(&self, order: &Order) {
        self.send(ExecutionReport::from_order(ExecKind::Replaced, order, None));
    }

    fn cancel_confirm(&self, order: &Order, reason: &str) {
        self.send(ExecutionReport::from_order(ExecKind::Cancelled, order, Some(reason)));
    }

    fn new_reject(&self, order: &Order, reason: &str) {
        self.send(ExecutionReport::from_order(ExecKind::Rejected, order, Some(reason)));
    }

    fn replace_reject(&self, order: &Order, reason: &str) {
        self.send(ExecutionReport::from_order(ExecKind::ReplaceRejected, order, Some(reason)));
    }

    fn cancel_reject(&self, order: &Order, reason: &str) {
        self.send(ExecutionReport::from_order(ExecKind::CancelRejected, order, Some(reason)));
    }

    fn market_to_limit(&self, order: &Order) {
        self.send(ExecutionReport::from_order(ExecKind::Restated, order, None));
    }

    fn triggered(&self, order: &Order) {
        self.send(ExecutionReport::from_order(ExecKind::Triggered, order, None));
    }

    fn fill_confirm(&self, order: &Order) {
        let kind = if order.pending_qty() == 0 {
            ExecKind::Fill
        } else {
            ExecKind::PartialFill
        };
        self.send(ExecutionReport::from_order(kind, order, None));
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReplySink for NullSink {
    fn send(&self, _report: ExecutionReport) {}
}

/// Keeps every report in arrival order.
#[derive(Debug, Default)]
pub struct EventLog {
    reports: Mutex<Vec<ExecutionReport>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<ExecutionReport> {
        std::mem::take(&mut *self.reports.lock())
    }

    pub fn snapshot(&self) -> Vec<ExecutionReport> {
        self.reports.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ExecKind> {
        self.reports.lock().iter().map(|r| r.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ReplySink for EventLog {
    fn send(&self, report: ExecutionReport) {
        self.reports.lock().push(report);
    }
}
