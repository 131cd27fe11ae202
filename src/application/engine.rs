//! Trading engine.
//!
//! Orchestrates one signal end to end: strategy validation, venue
//! selection, sizing, placement, persistence, and hand-off to the order
//! monitor. The engine never propagates errors past its caller's log line;
//! a failed signal is recorded (as a rejected log entry or a `failed` order
//! row) and the pipeline moves on.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::monitor::OrderMonitor;
use crate::domain::entities::order::status;
use crate::domain::entities::signal::{ContractType, TradingSignal};
use crate::domain::repositories::exchange_client::{ExchangeClient, OrderRequest};
use crate::domain::services::order_id::{OrderIdError, OrderIdGenerator, OrderKind};
use crate::domain::services::sizing::{determine_spot_order, SizingError, SymbolLimits};
use crate::domain::services::strategies::StrategyRegistry;
use crate::persistence::models::{NewOrder, OrderRecord};
use crate::persistence::repository::{ContractCodeRepository, OrderRepository};
use crate::persistence::DatabaseError;

/// Venue key for spot trading.
pub const SPOT_EXCHANGE: &str = "spot";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("signal rejected: {0}")]
    Rejected(String),

    #[error("invalid contract type: {0}")]
    InvalidContractType(i64),

    #[error(transparent)]
    Sizing(#[from] SizingError),

    #[error(transparent)]
    OrderId(#[from] OrderIdError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),

    #[error("order placement failed")]
    OrderFailed,
}

pub struct TradingEngine {
    exchanges: HashMap<String, Arc<dyn ExchangeClient>>,
    monitor: Arc<OrderMonitor>,
    registry: Arc<StrategyRegistry>,
    orders: Arc<OrderRepository>,
    contracts: Arc<ContractCodeRepository>,
    order_ids: Arc<OrderIdGenerator>,
}

impl TradingEngine {
    pub fn new(
        monitor: Arc<OrderMonitor>,
        registry: Arc<StrategyRegistry>,
        orders: Arc<OrderRepository>,
        contracts: Arc<ContractCodeRepository>,
        order_ids: Arc<OrderIdGenerator>,
    ) -> Self {
        TradingEngine {
            exchanges: HashMap::new(),
            monitor,
            registry,
            orders,
            contracts,
            order_ids,
        }
    }

    pub fn register_exchange(&mut self, venue: &str, client: Arc<dyn ExchangeClient>) {
        self.exchanges.insert(venue.to_string(), client);
    }

    fn exchange_for(
        &self,
        contract_type: ContractType,
    ) -> Result<(&Arc<dyn ExchangeClient>, &'static str), EngineError> {
        match contract_type {
            ContractType::Crypto => self
                .exchanges
                .get(SPOT_EXCHANGE)
                .map(|exchange| (exchange, SPOT_EXCHANGE))
                .ok_or(EngineError::InvalidContractType(contract_type.code())),
            other => Err(EngineError::InvalidContractType(other.code())),
        }
    }

    /// Run one signal through validation, sizing, and placement.
    pub async fn process_signal(&self, signal: &TradingSignal) -> Result<(), EngineError> {
        if let Err(reason) = self.registry.validate(signal).await {
            warn!(
                symbol = %signal.symbol,
                action = %signal.action,
                strategy_id = %signal.strategy_id,
                reason = %reason,
                "signal rejected by strategy"
            );
            return Err(EngineError::Rejected(reason));
        }

        let (exchange, venue) = self.exchange_for(signal.contract_type)?;

        let contract = self
            .contracts
            .find_by_symbol(&signal.symbol)
            .await?
            .ok_or_else(|| SizingError::SymbolNotFound(signal.symbol.clone()))?;
        let limits = SymbolLimits::from(&contract);

        let params = match determine_spot_order(signal, exchange.as_ref(), &limits).await {
            Ok(params) => params,
            Err(e) => {
                warn!(
                    symbol = %signal.symbol,
                    action = %signal.action,
                    code = e.code(),
                    error = %e,
                    "sizing rejected signal"
                );
                return Err(e.into());
            }
        };

        let strategy_id: i64 = signal.strategy_id.parse().unwrap_or(0);
        let system_order_id = self.order_ids.generate(OrderKind::Crypto)?;

        let mut order = NewOrder {
            system_order_id,
            order_id: String::new(),
            strategy_id,
            symbol: params.symbol.clone(),
            contract_type: venue.to_string(),
            contract_code: signal.contract_type.code().to_string(),
            order_type: params.order_type.clone(),
            price: params.price,
            amount: params.amount,
            action: params.action.clone(),
            position_side: params.position_side.to_string(),
            status: status::CREATED.to_string(),
        };

        let request = OrderRequest {
            symbol: params.symbol.clone(),
            price: params.price,
            amount: params.amount,
            side: params.action.clone(),
            order_type: params.order_type.clone(),
            position_side: params.position_side.to_string(),
        };

        let response = match exchange.create_order(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    symbol = %signal.symbol,
                    action = %signal.action,
                    error = %e,
                    "order placement failed"
                );

                // A placeholder id keeps the unique index satisfied for
                // failed placements that never got a venue id.
                order.status = status::FAILED.to_string();
                order.order_id = format!(
                    "failed_{}_{}",
                    Utc::now().timestamp_nanos_opt().unwrap_or_default(),
                    signal.id.unwrap_or(0)
                );
                if let Err(db_err) = self.orders.insert(order).await {
                    error!(error = %db_err, "failed to store failed order record");
                }
                return Err(EngineError::OrderFailed);
            }
        };

        order.order_id = response.order_id.clone();
        order.status = response.status.clone();

        let record = match self.orders.insert(order.clone()).await {
            Ok(record) => record,
            Err(e) => {
                // The venue accepted the order, so monitoring must proceed
                // even though the row is missing.
                error!(order_id = %order.order_id, error = %e, "failed to store order record");
                let now = Utc::now();
                OrderRecord {
                    id: 0,
                    system_order_id: order.system_order_id,
                    order_id: order.order_id,
                    strategy_id: order.strategy_id,
                    symbol: order.symbol,
                    contract_type: order.contract_type,
                    contract_code: order.contract_code,
                    order_type: order.order_type,
                    price: order.price,
                    amount: order.amount,
                    action: order.action,
                    position_side: order.position_side,
                    status: order.status,
                    filled_price: 0.0,
                    filled_amount: 0.0,
                    fee: 0.0,
                    fee_currency: String::new(),
                    created_at: now,
                    updated_at: now,
                }
            }
        };

        info!(
            order_id = %record.order_id,
            system_order_id = %record.system_order_id,
            symbol = %record.symbol,
            action = %record.action,
            position_side = %record.position_side,
            amount = record.amount,
            price = record.price,
            "order placed"
        );

        Arc::clone(&self.monitor).start(record, venue).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::strategies::StrategyRegistry;
    use crate::infrastructure::mock::MockExchange;
    use crate::persistence::models::NewContractCode;
    use crate::persistence::repository::{
        ContractCodeRepository, SignalRepository, StrategyRepository,
    };
    use crate::persistence::{init_database, DbPool};

    struct Fixture {
        engine: TradingEngine,
        exchange: Arc<MockExchange>,
        orders: Arc<OrderRepository>,
        monitor: Arc<OrderMonitor>,
    }

    async fn fixture(pool: DbPool) -> Fixture {
        let signals = Arc::new(SignalRepository::new(pool.clone()));
        let orders = Arc::new(OrderRepository::new(pool.clone()));
        let contracts = Arc::new(ContractCodeRepository::new(pool.clone()));
        let strategies = StrategyRepository::new(pool.clone());

        contracts
            .create(NewContractCode {
                symbol: "BTC_USDT".to_string(),
                code: "BTC".to_string(),
                exchange_id: None,
                min_amount: 0.001,
                amount_precision: 3,
                price_precision: 5,
                max_position_ratio: 20.0,
                status: true,
            })
            .await
            .unwrap();

        let registry = Arc::new(StrategyRegistry::new(Arc::clone(&signals)));
        registry
            .rebuild(&strategies.list_all().await.unwrap())
            .await;

        let exchange = Arc::new(MockExchange::new());
        exchange.set_balance("USDT", 10000.0, 10000.0).await;
        exchange.set_price("BTC_USDT", 50000.0).await;

        let monitor = Arc::new(OrderMonitor::new(Arc::clone(&orders)));
        monitor
            .register_exchange(SPOT_EXCHANGE, exchange.clone())
            .await;

        let mut engine = TradingEngine::new(
            Arc::clone(&monitor),
            registry,
            Arc::clone(&orders),
            contracts,
            Arc::new(OrderIdGenerator::new()),
        );
        engine.register_exchange(SPOT_EXCHANGE, exchange.clone());

        Fixture {
            engine,
            exchange,
            orders,
            monitor,
        }
    }

    fn signal(symbol: &str, action: &str) -> TradingSignal {
        TradingSignal {
            id: Some(7),
            secret_key: None,
            symbol: symbol.to_string(),
            scode: "BTC".to_string(),
            contract_type: ContractType::Crypto,
            price: 50000.0,
            action: action.to_string(),
            alert_title: "breakout".to_string(),
            time_circle: "1h".to_string(),
            strategy_id: "1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_open_signal_places_and_persists() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let fx = fixture(pool).await;

        fx.engine.process_signal(&signal("BTC_USDT", "buy")).await.unwrap();

        let placed = fx.exchange.created_orders().await;
        assert_eq!(placed.len(), 1);
        // 10000 * 20% cap, half committed, at 50000.
        assert_eq!(placed[0].amount, 0.020);
        assert_eq!(placed[0].side, "buy");
        assert_eq!(placed[0].position_side, "open");

        let record = fx
            .orders
            .get_by_order_id("mock-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "open");
        assert_eq!(record.contract_type, "spot");
        assert_eq!(record.contract_code, "4");
        assert_eq!(record.system_order_id.len(), 13);

        assert!(fx
            .monitor
            .active_orders()
            .await
            .iter()
            .any(|o| o.order_id == "mock-1"));
    }

    #[tokio::test]
    async fn test_placement_failure_persists_failed_record() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let fx = fixture(pool).await;
        fx.exchange.fail_next_create("insufficient funds").await;

        let result = fx.engine.process_signal(&signal("BTC_USDT", "buy")).await;
        assert!(matches!(result, Err(EngineError::OrderFailed)));

        let (records, total) = fx
            .orders
            .list(
                crate::persistence::repository::Page {
                    page: 1,
                    page_size: 10,
                },
                None,
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].status, "failed");
        assert!(records[0].order_id.starts_with("failed_"));
        assert!(records[0].order_id.ends_with("_7"));
        assert!(fx.monitor.active_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_crypto_contract_type_rejected() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let fx = fixture(pool).await;

        let mut stock = signal("BTC_USDT", "buy");
        stock.contract_type = ContractType::Stock;

        let result = fx.engine.process_signal(&stock).await;
        assert!(matches!(result, Err(EngineError::InvalidContractType(1))));
        assert!(fx.exchange.created_orders().await.is_empty());
        assert_eq!(fx.orders.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_symbol_rejected() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let fx = fixture(pool).await;
        fx.exchange.set_price("DOGE_USDT", 0.1).await;

        let result = fx.engine.process_signal(&signal("DOGE_USDT", "buy")).await;
        assert!(matches!(
            result,
            Err(EngineError::Sizing(SizingError::SymbolNotFound(_)))
        ));
        assert!(fx.exchange.created_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_strategy_rejection_stops_before_exchange() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let fx = fixture(pool).await;

        let mut bad = signal("BTC_USDT", "hold");
        bad.strategy_id = "1".to_string();

        let result = fx.engine.process_signal(&bad).await;
        assert!(matches!(result, Err(EngineError::Rejected(_))));
        assert!(fx.exchange.created_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_sell_without_position_rejected() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let fx = fixture(pool).await;

        let result = fx.engine.process_signal(&signal("BTC_USDT", "sell")).await;
        assert!(matches!(
            result,
            Err(EngineError::Sizing(SizingError::NoPositionToSell(_)))
        ));
    }
}
