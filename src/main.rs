//! Matchbook Performance Lab
//!
//! Runs performance tests followed by a scripted trading demo that prints
//! every execution report the book emits.

use orderbook::{ExecutionReport, OrderBook, OrderType, ReplySink, Side};
use std::sync::Arc;
use std::time::Duration;


use latency_test::order;

/// Prints each report as it happens.
struct PrintSink;

impl ReplySink for PrintSink {
    fn send(&self, r: ExecutionReport) {
        println!(
            "  {:<14} #{} {:?} {:?} px={} cum={} leaves={} last={}x{}{}",
            format!("{:?}", r.kind),
            r.order_id,
            r.side,
            r.order_type,
            r.price,
            r.cum_qty,
            r.leaves_qty,
            r.last_qty,
            r.last_px,
            r.text.map(|t| format!(" ({t})")).unwrap_or_default()
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    println!("=== Matchbook Performance Lab ===");

    latency_test::run_latency_tests();
    latency_test::run_throughput_test(Duration::from_secs(10));

    println!("\n=== Demo ===");
    run_demo();
}

fn run_demo() {
    let sink = Arc::new(PrintSink);

    println!("\n-- Full fill at 50 --");
    let first = order(1, Side::Buy, OrderType::Limit, 50, 100);
    let mut ob = OrderBook::new(sink.clone(), &first);
    ob.insert(first);
    ob.insert(order(2, Side::Sell, OrderType::Limit, 50, 100));
    let record = ob.market_picture_record();
    println!(
        "  circuit {}-{} volume={} value={} ltp={}",
        record.lower_ckt_limit, record.upper_ckt_limit, record.volume, record.value, record.last_trade_px
    );

    println!("\n-- Time priority at one price --");
    let first = order(10, Side::Buy, OrderType::Limit, 50, 50);
    let mut ob = OrderBook::new(sink.clone(), &first);
    ob.insert(first);
    ob.insert(order(11, Side::Buy, OrderType::Limit, 50, 30));
    ob.insert(order(12, Side::Sell, OrderType::Market, 0, 40));
    let record = ob.market_picture_record().clone();
    println!(
        "  bids: {} @ {} across {} orders",
        record.depth[0].total_buy_qty,
        record.depth[0].best_buy_px,
        ob.resting_orders().buys
    );

    println!("\n-- Stop buy at 60 --");
    let stop = order(20, Side::Buy, OrderType::Stop, 60, 10);
    let mut ob = OrderBook::new(sink.clone(), &stop);
    ob.insert(stop);
    println!("  parked stops: {}", ob.resting_orders().stop_buys);
    ob.insert(order(21, Side::Sell, OrderType::Limit, 60, 20));
    ob.insert(order(22, Side::Buy, OrderType::Limit, 60, 5));
    println!("  parked stops: {}, ltp={}", ob.resting_orders().stop_buys, ob.last_trade_px());

    println!("\n-- Market close --");
    ob.stop();
    ob.insert(order(23, Side::Buy, OrderType::Limit, 60, 5));
    ob.start();
    ob.insert(order(24, Side::Buy, OrderType::Limit, 59, 5));
    println!("  best bid after restart: {:?}", ob.best_bid());
}
