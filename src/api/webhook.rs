//! Webhook intake for trading signals.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AppState;
use crate::domain::entities::signal::TradingSignal;

/// `POST /api/webhook`
///
/// Decodes the signal, checks the shared secret (body `secretkey` or
/// `X-API-Key` header), and admits it to the processing queue with a
/// bounded wait. Overload answers 503 and has no side effects.
pub async fn handle_signal(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signal: TradingSignal = match serde_json::from_slice(&body) {
        Ok(signal) => signal,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let header_secret = headers.get("X-API-Key").and_then(|v| v.to_str().ok());
    let body_secret = signal.secret_key.as_deref();
    let authorized = body_secret == Some(state.secret_key.as_str())
        || header_secret == Some(state.secret_key.as_str());
    if !authorized {
        warn!(symbol = %signal.symbol, "webhook secret mismatch");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid secret key" })),
        );
    }

    info!(
        symbol = %signal.symbol,
        action = %signal.action,
        price = signal.price,
        time_circle = %signal.time_circle,
        strategy_id = %signal.strategy_id,
        "received trading signal"
    );

    let symbol = signal.symbol.clone();
    let action = signal.action.clone();

    match state.queues.admit(signal).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "received",
                "symbol": symbol,
                "action": action,
                "message": "signal accepted for processing",
            })),
        ),
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "signal not admitted");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "failed",
                    "symbol": symbol,
                    "action": action,
                    "message": "processing queue full",
                })),
            )
        }
    }
}
