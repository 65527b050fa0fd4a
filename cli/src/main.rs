use clap::{Args, Parser, Subcommand};
use orderbook::{MarketPictureRecord, OrderType, Side, TimeInForce};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "matchbook-cli")]
#[command(about = "Command line client for the matchbook exchange service")]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    server: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Identity {
    /// Security the order trades
    #[arg(short = 's', long)]
    security: String,
    #[arg(long, default_value = "cli")]
    sender: String,
    #[arg(short = 'c', long)]
    client_order_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new order
    New {
        #[command(flatten)]
        identity: Identity,
        #[arg(long, value_parser = parse_side)]
        side: Side,
        #[arg(short = 't', long = "type", value_parser = parse_order_type, default_value = "limit")]
        order_type: OrderType,
        #[arg(short = 'q', long)]
        qty: i64,
        #[arg(short = 'p', long)]
        price: Option<i64>,
        #[arg(long)]
        stop_price: Option<i64>,
        #[arg(long, value_parser = parse_tif, default_value = "day")]
        tif: TimeInForce,
        #[arg(long)]
        disclosed_qty: Option<i64>,
    },
    /// Cancel a resting order
    Cancel {
        order_id: u64,
        #[command(flatten)]
        identity: Identity,
        #[arg(long)]
        orig_client_order_id: String,
        #[arg(long, value_parser = parse_side)]
        side: Side,
        #[arg(short = 't', long = "type", value_parser = parse_order_type, default_value = "limit")]
        order_type: OrderType,
    },
    /// Cancel/replace a resting order
    Replace {
        order_id: u64,
        #[command(flatten)]
        identity: Identity,
        #[arg(long)]
        orig_client_order_id: String,
        #[arg(long, value_parser = parse_side)]
        side: Side,
        #[arg(short = 't', long = "type", value_parser = parse_order_type, default_value = "limit")]
        order_type: OrderType,
        /// Quantity still wanted working
        #[arg(short = 'q', long)]
        qty: i64,
        /// Quantity already filled
        #[arg(long, default_value = "0")]
        cum_qty: i64,
        #[arg(short = 'p', long)]
        price: Option<i64>,
        #[arg(long)]
        stop_price: Option<i64>,
        #[arg(long, value_parser = parse_tif, default_value = "day")]
        tif: TimeInForce,
    },
    /// Market picture of one security
    Picture {
        security: String,
    },
    Securities,
    Health,
}

#[derive(Deserialize)]
struct AcceptedResponse {
    order_id: u64,
    status: String,
}

#[derive(Deserialize)]
struct SecuritiesResponse {
    securities: Vec<String>,
}

#[derive(Deserialize)]
struct BookView {
    is_active: bool,
    record: MarketPictureRecord,
}

fn parse_side(s: &str) -> Result<Side, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_order_type(s: &str) -> Result<OrderType, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_tif(s: &str) -> Result<TimeInForce, String> {
    s.parse().map_err(|e| format!("{e}"))
}

/// Body for `POST /orders`. Enums go over the wire by name.
fn new_order_body(
    identity: &Identity,
    side: Side,
    order_type: OrderType,
    qty: i64,
    price: Option<i64>,
    stop_price: Option<i64>,
    tif: TimeInForce,
    disclosed_qty: Option<i64>,
) -> Value {
    json!({
        "security_id": identity.security,
        "client_order_id": identity.client_order_id,
        "sender_id": identity.sender,
        "side": side,
        "order_type": order_type,
        "qty": qty,
        "price": price,
        "stop_price": stop_price,
        "time_in_force": tif,
        "disclosed_qty": disclosed_qty,
    })
}

fn print_record(record: &MarketPictureRecord) {
    println!("Security: {}", record.scrip_code);
    println!(
        "Open {} High {} Low {} Close {}",
        record.open_px, record.high_px, record.low_px, record.close_px
    );
    println!(
        "Last {} x {} ({:?}), trades {}, volume {}, value {}",
        record.last_trade_px,
        record.last_trade_qty,
        record.trend,
        record.no_of_trades,
        record.volume,
        record.value
    );
    println!(
        "Circuit {} - {}",
        record.lower_ckt_limit, record.upper_ckt_limit
    );
    println!("\n  {:>10} {:>10} | {:<10} {:<10}", "Bid qty", "Bid", "Ask", "Ask qty");
    for level in &record.depth {
        println!(
            "  {:>10} {:>10} | {:<10} {:<10}",
            level.total_buy_qty, level.best_buy_px, level.best_sell_px, level.total_sell_qty
        );
    }
}

async fn print_accepted(response: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if response.status().is_success() {
        let result: AcceptedResponse = response.json().await?;
        println!("Order ID: {:010}", result.order_id);
        println!("Status: {}", result.status);
    } else {
        println!("Error: {}", response.status());
        println!("{}", response.text().await?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::New {
            identity,
            side,
            order_type,
            qty,
            price,
            stop_price,
            tif,
            disclosed_qty,
        } => {
            let body = new_order_body(&identity, side, order_type, qty, price, stop_price, tif, disclosed_qty);
            let response = client
                .post(format!("{}/orders", cli.server))
                .json(&body)
                .send()
                .await?;
            print_accepted(response).await?;
        }

        Commands::Cancel {
            order_id,
            identity,
            orig_client_order_id,
            side,
            order_type,
        } => {
            let body = json!({
                "original_client_order_id": orig_client_order_id,
                "security_id": identity.security,
                "client_order_id": identity.client_order_id,
                "sender_id": identity.sender,
                "side": side,
                "order_type": order_type,
            });
            let response = client
                .post(format!("{}/orders/{}/cancel", cli.server, order_id))
                .json(&body)
                .send()
                .await?;
            print_accepted(response).await?;
        }

        Commands::Replace {
            order_id,
            identity,
            orig_client_order_id,
            side,
            order_type,
            qty,
            cum_qty,
            price,
            stop_price,
            tif,
        } => {
            let body = json!({
                "original_client_order_id": orig_client_order_id,
                "security_id": identity.security,
                "client_order_id": identity.client_order_id,
                "sender_id": identity.sender,
                "side": side,
                "order_type": order_type,
                "qty": qty,
                "cum_qty": cum_qty,
                "price": price,
                "stop_price": stop_price,
                "time_in_force": tif,
            });
            let response = client
                .post(format!("{}/orders/{}/replace", cli.server, order_id))
                .json(&body)
                .send()
                .await?;
            print_accepted(response).await?;
        }

        Commands::Picture { security } => {
            let response = client
                .get(format!("{}/securities/{}/picture", cli.server, security))
                .send()
                .await?;

            if response.status().is_success() {
                let view: BookView = response.json().await?;
                print_record(&view.record);
                if !view.is_active {
                    println!("\nmarket is closed");
                }
            } else {
                println!("Error: {}", response.status());
                println!("{}", response.text().await?);
            }
        }

        Commands::Securities => {
            let response = client
                .get(format!("{}/securities", cli.server))
                .send()
                .await?;

            if response.status().is_success() {
                let result: SecuritiesResponse = response.json().await?;
                for security in result.securities {
                    println!("{}", security);
                }
            } else {
                println!("Error: {}", response.status());
            }
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.server))
                .send()
                .await?;

            if response.status().is_success() {
                let health: Value = response.json().await?;
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!("Error: {}", response.status());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_command_builds_wire_body() {
        let cli = Cli::try_parse_from([
            "matchbook-cli",
            "new",
            "-s",
            "500112",
            "-c",
            "c1",
            "--side",
            "1",
            "-t",
            "stop_limit",
            "-q",
            "10",
            "-p",
            "51",
            "--stop-price",
            "50",
            "--tif",
            "ioc",
        ])
        .unwrap();

        let Commands::New { identity, side, order_type, qty, price, stop_price, tif, disclosed_qty } = cli.command else {
            panic!("expected new");
        };
        let body = new_order_body(&identity, side, order_type, qty, price, stop_price, tif, disclosed_qty);
        assert_eq!(body["side"], "buy");
        assert_eq!(body["order_type"], "stop_limit");
        assert_eq!(body["time_in_force"], "immediate_or_cancel");
        assert_eq!(body["sender_id"], "cli");
        assert_eq!(body["stop_price"], 50);
        assert!(body["disclosed_qty"].is_null());
    }

    #[test]
    fn bad_side_is_refused_locally() {
        let result = Cli::try_parse_from([
            "matchbook-cli", "new", "-s", "X", "-c", "c1", "--side", "up", "-q", "1",
        ]);
        assert!(result.is_err());
    }
}
