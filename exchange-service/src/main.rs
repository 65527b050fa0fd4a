use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;
mod console;
mod http;
mod logging;
mod market;
mod publisher;
mod sinks;
mod types;
mod websocket;

use config::{Cli, Config};
use http::AppState;
use market::{Market, SnapshotSink};
use sinks::{PictureFanout, ReportFanout};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(Cli::parse())?;
    logging::init_logging(config.log_format)?;

    let reports = ReportFanout::new(4096);
    let pictures = PictureFanout::new(256);
    let market = Arc::new(Market::new(
        Arc::new(reports.clone()),
        config.snapshot_max_records,
    ));
    let shutdown = CancellationToken::new();

    // Ctrl+C behaves like `quit` on the console
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received Ctrl+C, shutting down");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl+C"),
            }
        });
    }

    let sweeper = tokio::spawn(run_sweeper(
        Arc::clone(&market),
        pictures.clone(),
        config.clone(),
        shutdown.clone(),
    ));

    if let Some(target) = config.udp_target {
        let rx = pictures.subscribe();
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = publisher::run_udp_publisher(target, rx, token).await {
                warn!(error = %e, "UDP publisher exited");
            }
        });
    }

    if config.console {
        tokio::spawn(console::run_console(Arc::clone(&market), shutdown.clone()));
    }

    let app = http::router(AppState {
        market: Arc::clone(&market),
        reports,
        pictures,
    });

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    info!(addr = %config.http_addr, "exchange service listening");
    info!("  POST /orders                      - New order");
    info!("  POST /orders/:id/cancel           - Cancel order");
    info!("  POST /orders/:id/replace          - Cancel/replace order");
    info!("  GET  /securities                  - Known securities");
    info!("  GET  /securities/:id/picture      - Market picture");
    info!("  GET  /health                      - Health check");
    info!("  WS   /reports/stream?sender_id=   - Execution reports");
    info!("  WS   /pictures/stream             - Market pictures");

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("HTTP server failed")?;

    if let Err(e) = sweeper.await {
        warn!(error = %e, "sweeper task failed");
    }

    info!("exchange service stopped");
    Ok(())
}

/// Publishes changed market pictures every snapshot interval. One final
/// sweep runs on shutdown so the closing state goes out.
async fn run_sweeper(
    market: Arc<Market>,
    pictures: PictureFanout,
    config: Config,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(config.snapshot_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                sweep(&market, &pictures);
            }
        }
    }

    market.stop();
    sweep(&market, &pictures);
}

fn sweep(market: &Market, sink: &dyn SnapshotSink) {
    let published = market.sweep(sink);
    if published > 0 {
        tracing::debug!(published, "market pictures published");
    }
}
