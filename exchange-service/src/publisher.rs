//! UDP market-picture feed: one JSON datagram per flushed picture.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use orderbook::MarketPicture;
use tokio::net::UdpSocket;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run_udp_publisher(
    target: SocketAddr,
    mut pictures: broadcast::Receiver<Arc<MarketPicture>>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let bind: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind)
        .await
        .with_context(|| format!("failed to bind UDP socket for {target}"))?;
    info!(%target, "UDP picture feed started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = pictures.recv() => match received {
                Ok(picture) => {
                    let payload = serde_json::to_vec(picture.as_ref())?;
                    if let Err(e) = socket.send_to(&payload, target).await {
                        warn!(%target, error = %e, "failed to send market picture");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "UDP publisher fell behind, pictures dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    info!(%target, "UDP picture feed stopped");
    Ok(())
}
