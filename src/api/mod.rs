//! HTTP surface: webhook intake and the admin API.

pub mod admin;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::account_cache::AccountValueCache;
use crate::application::queue::SignalQueues;
use crate::domain::repositories::exchange_client::ExchangeClient;
use crate::domain::services::strategies::StrategyRegistry;
use crate::persistence::repository::{
    ContractCodeRepository, OrderRepository, SignalRepository, StrategyRepository,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub secret_key: String,
    pub queues: SignalQueues,
    pub signals: Arc<SignalRepository>,
    pub orders: Arc<OrderRepository>,
    pub contracts: Arc<ContractCodeRepository>,
    pub strategies: Arc<StrategyRepository>,
    pub registry: Arc<StrategyRegistry>,
    pub account_cache: Arc<AccountValueCache>,
    pub exchange: Arc<dyn ExchangeClient>,
}

/// Build the full application router.
///
/// Admin routes are exposed under `/api` and mirrored under `/api/admin`;
/// strategy management lives only in the admin group.
pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/signals", get(admin::list_signals))
        .route("/signals/:id", get(admin::get_signal))
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id", get(admin::get_order))
        .route("/stats", get(admin::get_stats))
        .route("/refresh-account", post(admin::refresh_account))
        .route(
            "/contract-codes",
            get(admin::list_contract_codes).post(admin::create_contract_code),
        )
        .route(
            "/contract-codes/:id",
            get(admin::get_contract_code)
                .put(admin::update_contract_code)
                .delete(admin::delete_contract_code),
        );

    let strategy_routes = Router::new()
        .route(
            "/strategies",
            get(admin::list_strategies).post(admin::create_strategy),
        )
        .route(
            "/strategies/:id",
            get(admin::get_strategy)
                .put(admin::update_strategy)
                .delete(admin::delete_strategy),
        );

    Router::new()
        .route("/api/webhook", post(webhook::handle_signal))
        .nest("/api", admin_routes.clone())
        .nest("/api/admin", admin_routes.merge(strategy_routes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
