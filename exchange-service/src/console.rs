//! Operator console on stdin.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::market::Market;

pub const USAGE: &str = "commands: start | stop | quit (q)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Quit,
    Help,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_lowercase().as_str() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "quit" | "q" => Command::Quit,
            _ => Command::Help,
        }
    }
}

/// Applies one command. Returns `false` once the console should exit.
pub fn apply(market: &Market, command: Command) -> bool {
    match command {
        Command::Start => market.start(),
        Command::Stop => market.stop(),
        Command::Quit => {
            market.stop();
            return false;
        }
        Command::Help => println!("{USAGE}"),
    }
    true
}

/// Reads commands until `quit`, end of input, or shutdown. `quit` cancels
/// `shutdown` so the rest of the service winds down with it.
pub async fn run_console(market: Arc<Market>, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{USAGE}");

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                let command = Command::parse(&line);
                info!(?command, "console command");
                if !apply(&market, command) {
                    shutdown.cancel();
                    break;
                }
            }
            // stdin closed, e.g. running detached
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "console read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderbook::{EventLog, ExecKind, NewOrderRequest, OrderType, Side, TimeInForce};

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("start"), Command::Start);
        assert_eq!(Command::parse(" STOP \n"), Command::Stop);
        assert_eq!(Command::parse("q"), Command::Quit);
        assert_eq!(Command::parse("quit"), Command::Quit);
        assert_eq!(Command::parse("halt"), Command::Help);
        assert_eq!(Command::parse(""), Command::Help);
    }

    #[test]
    fn quit_stops_the_market_and_ends_the_loop() {
        let log = Arc::new(EventLog::new());
        let market = Market::new(log.clone(), 10);
        market
            .submit(NewOrderRequest {
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
            })
            .unwrap();

        assert!(apply(&market, Command::Help));
        assert!(apply(&market, Command::Start));
        assert!(!apply(&market, Command::Quit));
        assert!(!market.is_active());
        assert_eq!(log.kinds(), vec![ExecKind::New, ExecKind::Cancelled]);
    }
}
