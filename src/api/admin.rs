//! Admin API: paginated reads over signals and orders, symbol and strategy
//! management, stats, and the manual account-value refresh.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::AppState;
use crate::persistence::models::{NewContractCode, NewStrategy};
use crate::persistence::repository::Page;
use crate::persistence::DatabaseError;

type ApiResponse = (StatusCode, Json<Value>);

fn ok(body: Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

fn not_found(what: &str) -> ApiResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{what} not found") })),
    )
}

fn internal(e: DatabaseError) -> ApiResponse {
    error!(error = %e, "admin query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub symbol: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl ListQuery {
    fn page(&self) -> Page {
        Page {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

fn paginated(items: Value, total: i64, query: &ListQuery) -> Value {
    json!({
        "items": items,
        "total": total,
        "page": query.page,
        "page_size": query.page_size,
    })
}

pub async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResponse {
    match state
        .signals
        .list(query.page(), query.symbol.as_deref(), query.action.as_deref())
        .await
    {
        Ok((items, total)) => ok(paginated(json!(items), total, &query)),
        Err(e) => internal(e),
    }
}

pub async fn get_signal(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResponse {
    match state.signals.get(id).await {
        Ok(Some(signal)) => ok(json!(signal)),
        Ok(None) => not_found("signal"),
        Err(e) => internal(e),
    }
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResponse {
    match state
        .orders
        .list(
            query.page(),
            query.symbol.as_deref(),
            query.action.as_deref(),
            query.status.as_deref(),
        )
        .await
    {
        Ok((items, total)) => ok(paginated(json!(items), total, &query)),
        Err(e) => internal(e),
    }
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResponse {
    match state.orders.get(id).await {
        Ok(Some(order)) => ok(json!(order)),
        Ok(None) => not_found("order"),
        Err(e) => internal(e),
    }
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResponse {
    let signal_count = match state.signals.count().await {
        Ok(count) => count,
        Err(e) => return internal(e),
    };
    let order_count = match state.orders.count().await {
        Ok(count) => count,
        Err(e) => return internal(e),
    };

    ok(json!({
        "signalCount": signal_count,
        "orderCount": order_count,
        "accountValue": state.account_cache.get().await,
    }))
}

pub async fn refresh_account(State(state): State<AppState>) -> ApiResponse {
    state.account_cache.refresh(state.exchange.as_ref()).await;
    ok(json!({
        "accountValue": state.account_cache.get().await,
        "message": "account value refreshed",
    }))
}

pub async fn list_contract_codes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResponse {
    match state.contracts.list(query.page()).await {
        Ok((items, total)) => ok(paginated(json!(items), total, &query)),
        Err(e) => internal(e),
    }
}

pub async fn get_contract_code(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResponse {
    match state.contracts.get(id).await {
        Ok(Some(contract)) => ok(json!(contract)),
        Ok(None) => not_found("contract code"),
        Err(e) => internal(e),
    }
}

pub async fn create_contract_code(
    State(state): State<AppState>,
    Json(input): Json<NewContractCode>,
) -> ApiResponse {
    match state.contracts.create(input).await {
        Ok(contract) => (StatusCode::CREATED, Json(json!(contract))),
        Err(e) => internal(e),
    }
}

pub async fn update_contract_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<NewContractCode>,
) -> ApiResponse {
    match state.contracts.update(id, input).await {
        Ok(Some(contract)) => ok(json!(contract)),
        Ok(None) => not_found("contract code"),
        Err(e) => internal(e),
    }
}

pub async fn delete_contract_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResponse {
    match state.contracts.delete(id).await {
        Ok(true) => ok(json!({ "message": "contract code deleted" })),
        Ok(false) => not_found("contract code"),
        Err(e) => internal(e),
    }
}

pub async fn list_strategies(State(state): State<AppState>) -> ApiResponse {
    match state.strategies.list_all().await {
        Ok(items) => ok(json!(items)),
        Err(e) => internal(e),
    }
}

pub async fn get_strategy(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResponse {
    match state.strategies.get(id).await {
        Ok(Some(strategy)) => ok(json!(strategy)),
        Ok(None) => not_found("strategy"),
        Err(e) => internal(e),
    }
}

/// Every strategy write rebuilds the runtime registry so validators track
/// the persisted definitions.
async fn rebuild_registry(state: &AppState) {
    match state.strategies.list_all().await {
        Ok(definitions) => state.registry.rebuild(&definitions).await,
        Err(e) => error!(error = %e, "registry rebuild skipped, strategy load failed"),
    }
}

pub async fn create_strategy(
    State(state): State<AppState>,
    Json(input): Json<NewStrategy>,
) -> ApiResponse {
    match state.strategies.create(input).await {
        Ok(strategy) => {
            rebuild_registry(&state).await;
            (StatusCode::CREATED, Json(json!(strategy)))
        }
        Err(e) => internal(e),
    }
}

pub async fn update_strategy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<NewStrategy>,
) -> ApiResponse {
    match state.strategies.update(id, input).await {
        Ok(Some(strategy)) => {
            rebuild_registry(&state).await;
            ok(json!(strategy))
        }
        Ok(None) => not_found("strategy"),
        Err(e) => internal(e),
    }
}

pub async fn delete_strategy(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResponse {
    match state.strategies.delete(id).await {
        Ok(true) => {
            rebuild_registry(&state).await;
            ok(json!({ "message": "strategy deleted" }))
        }
        Ok(false) => not_found("strategy"),
        Err(e) => internal(e),
    }
}
