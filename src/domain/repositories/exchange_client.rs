//! Exchange client trait.
//!
//! Common interface over one trading venue. The engine, sizing, and monitor
//! all operate against this trait so venues can be swapped and tests can run
//! against a mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::position::Position;

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("price query failed: {0}")]
    PriceQueryFailed(String),

    #[error("balance query failed: {0}")]
    BalanceQueryFailed(String),

    #[error("order placement failed: {0}")]
    OrderPlacementFailed(String),

    #[error("order cancellation failed: {0}")]
    OrderCancellationFailed(String),

    #[error("order status query failed: {0}")]
    OrderStatusFailed(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("invalid order parameters: {0}")]
    InvalidOrder(String),
}

impl ExchangeError {
    /// Whether a cancellation failure reads as "the venue no longer knows
    /// this order" — typically because it filled or was purged after
    /// cancellation. Drives the reconciliation path in the monitor.
    pub fn is_order_not_found(&self) -> bool {
        let message = self.to_string().to_lowercase();
        message.contains("not found") || message.contains("does not exist")
    }
}

/// Account balance for one currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    pub available: f64,
    pub total: f64,
}

/// Order placement request, venue-agnostic.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub price: f64,
    pub amount: f64,
    /// "buy" or "sell".
    pub side: String,
    /// "limit" is the only type the system places.
    pub order_type: String,
    /// "open" or "close"; informational for spot venues.
    pub position_side: String,
}

/// Order state as reported by the venue, after status normalization.
#[derive(Debug, Clone, Default)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    pub filled_qty: f64,
    pub filled_price: f64,
    pub fee: f64,
    pub fee_currency: String,
}

/// Uniform operations over one venue.
///
/// Implementations normalize venue statuses before returning them:
/// `closed` with a positive fill maps to `filled`, `closed` with zero fill
/// maps to `canceled`, and other venue statuses pass through.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Venue name for logs.
    fn name(&self) -> &str;

    /// Last traded price for a symbol, e.g. `BTC_USDT`.
    async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64>;

    /// Available and total balance for one currency.
    async fn get_balance(&self, currency: &str) -> ExchangeResult<Balance>;

    /// All non-empty spot balances, for account valuation.
    async fn list_balances(&self) -> ExchangeResult<Vec<Balance>>;

    /// Derived spot position for a symbol; `None` when the base asset is not
    /// held.
    async fn get_position(&self, symbol: &str) -> ExchangeResult<Option<Position>>;

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()>;

    async fn get_order_status(&self, symbol: &str, order_id: &str)
        -> ExchangeResult<OrderResponse>;
}
