//! Broadcast fan-out for execution reports and market pictures.

use std::sync::Arc;

use orderbook::{ExecutionReport, MarketPicture, ReplySink};
use tokio::sync::broadcast;
use tracing::debug;

use crate::market::SnapshotSink;

/// Execution reports to every connected report stream.
#[derive(Clone)]
pub struct ReportFanout {
    tx: broadcast::Sender<ExecutionReport>,
}

impl ReportFanout {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionReport> {
        self.tx.subscribe()
    }
}

impl ReplySink for ReportFanout {
    fn send(&self, report: ExecutionReport) {
        debug!(
            kind = ?report.kind,
            order_id = %report.order_id,
            sender = %report.sender_id,
            "execution report"
        );
        // no subscribers is not an error
        let _ = self.tx.send(report);
    }
}

/// Flushed pictures to websocket subscribers and the UDP publisher.
#[derive(Clone)]
pub struct PictureFanout {
    tx: broadcast::Sender<Arc<MarketPicture>>,
}

impl PictureFanout {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<MarketPicture>> {
        self.tx.subscribe()
    }
}

impl SnapshotSink for PictureFanout {
    fn publish(&self, picture: &MarketPicture) {
        let _ = self.tx.send(Arc::new(picture.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderbook::{ExecKind, MarketPictureRecord, NewOrderRequest, Order, OrderId, OrderType, Side, TimeInForce};

    #[tokio::test]
    async fn reports_reach_every_subscriber() {
        let fanout = ReportFanout::new(16);
        let mut a = fanout.subscribe();
        let mut b = fanout.subscribe();

        let req = NewOrderRequest {
            security_id: "500112".into(),
            client_order_id: "c1".into(),
            sender_id: "T1".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            qty: 10,
            price: Some(50),
            stop_price: None,
            time_in_force: TimeInForce::Day,
            disclosed_qty: None,
        };
        let order = Order::new_order(OrderId(1), req).unwrap();
        fanout.new_confirm(&order);

        assert_eq!(a.recv().await.unwrap().kind, ExecKind::New);
        assert_eq!(b.recv().await.unwrap().order_id, OrderId(1));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let fanout = PictureFanout::new(4);
        let mut picture = MarketPicture::new();
        picture.push(MarketPictureRecord::new("A"));
        fanout.publish(&picture);

        let mut rx = fanout.subscribe();
        fanout.publish(&picture);
        assert_eq!(rx.recv().await.unwrap().records[0].scrip_code, "A");
    }
}
