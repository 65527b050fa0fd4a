//! WebSocket handlers for execution reports and market pictures.
//!
//! Both streams forward a broadcast channel to the socket, answer pings and
//! send a heartbeat every 30 seconds.

use axum::extract::ws::{Message, WebSocket};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::{http::AppState, types::*};

const HEARTBEAT: Duration = Duration::from_secs(30);

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Streams execution reports, optionally only those for one sender.
pub async fn handle_report_stream(socket: WebSocket, filter: ReportFilter, state: AppState) {
    let sender_id = filter.sender_id;
    info!(sender = ?sender_id, "report stream connected");

    let reports = state.reports.subscribe();
    forward(socket, reports, "reports", move |report| {
        match &sender_id {
            Some(wanted) if *wanted != report.sender_id => None,
            _ => Some(WebSocketMessage::Report(report)),
        }
    })
    .await;
}

/// Streams every published market picture.
pub async fn handle_picture_stream(socket: WebSocket, state: AppState) {
    info!("picture stream connected");

    let pictures = state.pictures.subscribe();
    forward(socket, pictures, "pictures", |picture| {
        Some(WebSocketMessage::Picture(picture))
    })
    .await;
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &T,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            warn!(error = %e, "failed to encode websocket message");
            Ok(())
        }
    }
}

async fn forward<T, F>(socket: WebSocket, mut rx: broadcast::Receiver<T>, stream: &'static str, mut to_message: F)
where
    T: Clone,
    F: FnMut(T) -> Option<WebSocketMessage>,
{
    let (mut sender, mut receiver) = socket.split();
    let mut ping_interval = interval(HEARTBEAT);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(WebSocketMessage::Ping { timestamp }) = serde_json::from_str::<WebSocketMessage>(&text) {
                            let _ = send_json(&mut sender, &WebSocketMessage::Pong { timestamp }).await;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Binary(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        error!(stream, error = %e, "websocket error");
                        break;
                    }
                }
            }

            item = rx.recv() => {
                match item {
                    Ok(item) => {
                        if let Some(message) = to_message(item) {
                            if send_json(&mut sender, &message).await.is_err() {
                                warn!(stream, "client went away");
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(stream, skipped, "subscriber lagged");
                        let notice = WebSocketMessage::Error {
                            message: format!("{skipped} messages dropped"),
                        };
                        if send_json(&mut sender, &notice).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = ping_interval.tick() => {
                let ping = WebSocketMessage::Ping { timestamp: now_millis() };
                if send_json(&mut sender, &ping).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(stream, "websocket stream ended");
}
