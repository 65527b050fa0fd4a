//! JSON/HTTP order entry and queries.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use orderbook::{BookError, NewOrderRequest, Order, OrderId, TranslateError};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::market::Market;
use crate::sinks::{PictureFanout, ReportFanout};
use crate::types::*;
use crate::websocket;

#[derive(Clone)]
pub struct AppState {
    pub market: Arc<Market>,
    pub reports: ReportFanout,
    pub pictures: PictureFanout,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/securities", get(list_securities))
        .route("/securities/:security/picture", get(get_picture))
        .route("/orders", post(submit_order))
        .route("/orders/:order_id/cancel", post(cancel_order))
        .route("/orders/:order_id/replace", post(replace_order))
        .route("/reports/stream", get(report_stream))
        .route("/pictures/stream", get(picture_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "exchange-service",
        "version": env!("CARGO_PKG_VERSION"),
        "market_active": state.market.is_active(),
        "securities": state.market.securities().len(),
        "timestamp": SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default(),
    }))
}

async fn list_securities(State(state): State<AppState>) -> impl IntoResponse {
    Json(SecuritiesResponse {
        securities: state.market.securities(),
    })
}

async fn get_picture(
    Path(security): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.market.picture(&security)?))
}

async fn submit_order(
    State(state): State<AppState>,
    Json(body): Json<NewOrderBody>,
) -> Result<impl IntoResponse, AppError> {
    let request = NewOrderRequest::try_from(body)?;
    let order_id = state.market.submit(request)?;
    Ok((StatusCode::CREATED, Json(AcceptedResponse::accepted(order_id))))
}

async fn cancel_order(
    Path(order_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<CancelBody>,
) -> Result<impl IntoResponse, AppError> {
    let order_id = parse_order_id(&order_id)?;
    let request = body.into_request(order_id)?;
    state.market.cancel(Order::cancel_request(request))?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::accepted(order_id))))
}

async fn replace_order(
    Path(order_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<ReplaceBody>,
) -> Result<impl IntoResponse, AppError> {
    let order_id = parse_order_id(&order_id)?;
    let request = body.into_request(order_id)?;
    state.market.replace(Order::replace_request(request)?)?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::accepted(order_id))))
}

async fn report_stream(
    Query(filter): Query<ReportFilter>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| websocket::handle_report_stream(socket, filter, state))
}

async fn picture_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| websocket::handle_picture_stream(socket, state))
}

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    raw.parse()
        .map_err(|_| AppError::InvalidOrderId(raw.to_string()))
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Book(#[from] BookError),

    #[error("Invalid order id : {0}")]
    InvalidOrderId(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Translate(_) | AppError::InvalidOrderId(_) => StatusCode::BAD_REQUEST,
            AppError::Book(BookError::RejectReplace(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Book(_) => StatusCode::NOT_FOUND,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use orderbook::ExecKind;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, AppState) {
        let reports = ReportFanout::new(64);
        let pictures = PictureFanout::new(8);
        let market = Arc::new(Market::new(Arc::new(reports.clone()), 10));
        let state = AppState {
            market,
            reports,
            pictures,
        };
        (router(state.clone()), state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn limit_body(side: &str, px: i64, qty: i64) -> Value {
        json!({
            "security_id": "500112",
            "client_order_id": format!("{side}-{px}"),
            "sender_id": "T1",
            "side": side,
            "order_type": "limit",
            "qty": qty,
            "price": px
        })
    }

    #[tokio::test]
    async fn new_order_is_accepted_and_reported() {
        let (app, state) = app();
        let mut reports = state.reports.subscribe();

        let (status, body) = call(&app, "POST", "/orders", Some(limit_body("buy", 50, 100))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "accepted");

        let report = reports.recv().await.unwrap();
        assert_eq!(report.kind, ExecKind::New);
        assert_eq!(json!(report.order_id), body["order_id"]);

        let (status, body) = call(&app, "GET", "/securities", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["securities"], json!(["500112"]));

        let (status, body) = call(&app, "GET", "/securities/500112/picture", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"]["depth"][0]["best_buy_px"], 50);
        assert_eq!(body["resting"]["buys"], 1);
    }

    #[tokio::test]
    async fn untranslatable_order_is_bad_request() {
        let (app, state) = app();
        let (status, body) = call(&app, "POST", "/orders", Some(limit_body("sideways", 50, 1))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Side not handled"));
        assert!(state.market.securities().is_empty());
    }

    #[tokio::test]
    async fn oversized_price_is_bad_request() {
        let (app, state) = app();
        let body = limit_body("sell", i64::MAX / 2, 3);
        let (status, body) = call(&app, "POST", "/orders", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Price out of range"));
        assert!(state.market.securities().is_empty());
    }

    #[tokio::test]
    async fn cancel_for_unknown_security_is_not_found() {
        let (app, _state) = app();
        let body = json!({
            "original_client_order_id": "c1",
            "security_id": "NOPE",
            "client_order_id": "c1-x",
            "sender_id": "T1",
            "side": "buy",
            "order_type": "limit"
        });

        let (status, body) = call(&app, "POST", "/orders/42/cancel", Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("NOPE"));

        let (status, _) = call(&app, "GET", "/securities/NOPE/picture", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn replace_goes_through_to_the_book() {
        let (app, state) = app();
        let (_, body) = call(&app, "POST", "/orders", Some(limit_body("sell", 50, 10))).await;
        let order_id = body["order_id"].as_u64().unwrap();
        let mut reports = state.reports.subscribe();

        let replace = json!({
            "original_client_order_id": "sell-50",
            "security_id": "500112",
            "client_order_id": "sell-50-r",
            "sender_id": "T1",
            "side": "sell",
            "order_type": "limit",
            "qty": 20,
            "price": 52
        });
        let (status, _) = call(&app, "POST", &format!("/orders/{order_id}/replace"), Some(replace)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let report = reports.recv().await.unwrap();
        assert_eq!(report.kind, ExecKind::Replaced);
        assert_eq!((report.price, report.leaves_qty), (52, 20));
    }

    #[tokio::test]
    async fn malformed_order_id_is_bad_request() {
        let (app, _state) = app();
        let body = json!({
            "original_client_order_id": "c1",
            "security_id": "500112",
            "client_order_id": "c1-x",
            "sender_id": "T1",
            "side": "buy",
            "order_type": "limit"
        });
        let (status, _) = call(&app, "POST", "/orders/abc/cancel", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_market_state() {
        let (app, state) = app();
        state.market.stop();
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["market_active"], false);
    }
}
