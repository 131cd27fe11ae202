//! Scriptable in-memory exchange.
//!
//! Used by unit and integration tests to drive the engine and monitor
//! without a live venue. Prices, balances, positions, and per-order status
//! sequences are set up front; placements and cancellations are recorded
//! for assertions.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::domain::entities::position::Position;
use crate::domain::repositories::exchange_client::{
    Balance, ExchangeClient, ExchangeError, ExchangeResult, OrderRequest, OrderResponse,
};

#[derive(Default)]
struct MockState {
    prices: HashMap<String, f64>,
    balances: HashMap<String, Balance>,
    positions: HashMap<String, f64>,
    create_error: Option<String>,
    cancel_error: Option<String>,
    created: Vec<OrderRequest>,
    canceled: Vec<String>,
    /// Per-order status playback. The last entry is sticky so an order can
    /// sit in `open` for as many polls as the test needs.
    status_scripts: HashMap<String, VecDeque<Result<OrderResponse, String>>>,
}

pub struct MockExchange {
    state: Mutex<MockState>,
    next_order_id: AtomicU64,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        MockExchange {
            state: Mutex::new(MockState::default()),
            next_order_id: AtomicU64::new(1),
        }
    }

    pub async fn set_price(&self, symbol: &str, price: f64) {
        self.state
            .lock()
            .await
            .prices
            .insert(symbol.to_string(), price);
    }

    pub async fn set_balance(&self, currency: &str, available: f64, total: f64) {
        self.state.lock().await.balances.insert(
            currency.to_string(),
            Balance {
                currency: currency.to_string(),
                available,
                total,
            },
        );
    }

    pub async fn set_position(&self, symbol: &str, size: f64) {
        self.state
            .lock()
            .await
            .positions
            .insert(symbol.to_string(), size);
    }

    pub async fn fail_next_create(&self, message: &str) {
        self.state.lock().await.create_error = Some(message.to_string());
    }

    pub async fn fail_cancel(&self, message: &str) {
        self.state.lock().await.cancel_error = Some(message.to_string());
    }

    /// Append one status observation for an order. Entries play back in
    /// order; the final entry repeats forever.
    pub async fn push_status(&self, order_id: &str, response: OrderResponse) {
        self.state
            .lock()
            .await
            .status_scripts
            .entry(order_id.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    pub async fn push_status_error(&self, order_id: &str, message: &str) {
        self.state
            .lock()
            .await
            .status_scripts
            .entry(order_id.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    pub async fn created_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().await.created.clone()
    }

    pub async fn canceled_orders(&self) -> Vec<String> {
        self.state.lock().await.canceled.clone()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64> {
        self.state
            .lock()
            .await
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::PriceQueryFailed(format!("no ticker for {symbol}")))
    }

    async fn get_balance(&self, currency: &str) -> ExchangeResult<Balance> {
        Ok(self
            .state
            .lock()
            .await
            .balances
            .get(currency)
            .cloned()
            .unwrap_or(Balance {
                currency: currency.to_string(),
                available: 0.0,
                total: 0.0,
            }))
    }

    async fn list_balances(&self) -> ExchangeResult<Vec<Balance>> {
        let state = self.state.lock().await;
        let mut balances: Vec<Balance> = state.balances.values().cloned().collect();
        balances.sort_by(|a, b| a.currency.cmp(&b.currency));
        Ok(balances)
    }

    async fn get_position(&self, symbol: &str) -> ExchangeResult<Option<Position>> {
        let state = self.state.lock().await;
        Ok(state
            .positions
            .get(symbol)
            .filter(|size| **size > 0.0)
            .map(|size| Position::spot(symbol, *size)))
    }

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.create_error.take() {
            return Err(ExchangeError::OrderPlacementFailed(message));
        }

        state.created.push(request.clone());
        let order_id = format!("mock-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst));
        Ok(OrderResponse {
            order_id,
            status: "open".to_string(),
            ..OrderResponse::default()
        })
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &str) -> ExchangeResult<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.cancel_error.take() {
            return Err(ExchangeError::OrderCancellationFailed(message));
        }
        state.canceled.push(order_id.to_string());
        Ok(())
    }

    async fn get_order_status(
        &self,
        _symbol: &str,
        order_id: &str,
    ) -> ExchangeResult<OrderResponse> {
        let mut state = self.state.lock().await;
        let script = state
            .status_scripts
            .get_mut(order_id)
            .ok_or_else(|| ExchangeError::OrderStatusFailed(format!("unknown order {order_id}")))?;

        let entry = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };

        entry
            .ok_or_else(|| ExchangeError::OrderStatusFailed(format!("unknown order {order_id}")))?
            .map_err(ExchangeError::OrderStatusFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_script_playback_is_sticky() {
        let exchange = MockExchange::new();
        exchange
            .push_status(
                "o1",
                OrderResponse {
                    order_id: "o1".to_string(),
                    status: "open".to_string(),
                    ..OrderResponse::default()
                },
            )
            .await;
        exchange
            .push_status(
                "o1",
                OrderResponse {
                    order_id: "o1".to_string(),
                    status: "filled".to_string(),
                    filled_qty: 1.0,
                    ..OrderResponse::default()
                },
            )
            .await;

        assert_eq!(
            exchange.get_order_status("S", "o1").await.unwrap().status,
            "open"
        );
        assert_eq!(
            exchange.get_order_status("S", "o1").await.unwrap().status,
            "filled"
        );
        // Last entry repeats.
        assert_eq!(
            exchange.get_order_status("S", "o1").await.unwrap().status,
            "filled"
        );
    }

    #[tokio::test]
    async fn test_create_failure_is_one_shot() {
        let exchange = MockExchange::new();
        exchange.fail_next_create("rejected").await;

        let request = OrderRequest {
            symbol: "BTC_USDT".to_string(),
            price: 1.0,
            amount: 1.0,
            side: "buy".to_string(),
            order_type: "limit".to_string(),
            position_side: "open".to_string(),
        };
        assert!(exchange.create_order(&request).await.is_err());
        assert!(exchange.create_order(&request).await.is_ok());
        assert_eq!(exchange.created_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_position_only_for_positive_sizes() {
        let exchange = MockExchange::new();
        exchange.set_position("BTC_USDT", 0.0).await;
        assert!(exchange.get_position("BTC_USDT").await.unwrap().is_none());

        exchange.set_position("BTC_USDT", 0.5).await;
        let position = exchange.get_position("BTC_USDT").await.unwrap().unwrap();
        assert_eq!(position.size, 0.5);
        assert_eq!(position.margin_type, "spot");
    }
}
