use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradewire::api::{self, AppState};
use tradewire::application::account_cache::AccountValueCache;
use tradewire::application::engine::{TradingEngine, SPOT_EXCHANGE};
use tradewire::application::monitor::OrderMonitor;
use tradewire::application::queue::{signal_queues, spawn_process_drain, spawn_store_drain};
use tradewire::config::AppConfig;
use tradewire::domain::repositories::exchange_client::ExchangeClient;
use tradewire::domain::services::order_id::OrderIdGenerator;
use tradewire::domain::services::position_limits::validate_position_ratios;
use tradewire::domain::services::strategies::StrategyRegistry;
use tradewire::infrastructure::gateio_client::GateIoClient;
use tradewire::persistence;
use tradewire::persistence::repository::{
    ContractCodeRepository, OrderRepository, SignalRepository, StrategyRepository,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional .env for TRADEWIRE_CONFIG / RUST_LOG overrides.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradewire=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    info!(port = config.server.port, mode = %config.server.mode, "starting tradewire");

    let pool = persistence::init_database(&config.database.url(), config.database.max_connections)
        .await?;

    let signals = Arc::new(SignalRepository::new(pool.clone()));
    let orders = Arc::new(OrderRepository::new(pool.clone()));
    let contracts = Arc::new(ContractCodeRepository::new(pool.clone()));
    let strategies = Arc::new(StrategyRepository::new(pool.clone()));

    let registry = Arc::new(StrategyRegistry::new(Arc::clone(&signals)));
    registry.rebuild(&strategies.list_all().await?).await;

    let ratio_summary = validate_position_ratios(&contracts).await?;
    if !ratio_summary.within_budget {
        warn!(
            total_ratio = ratio_summary.total_ratio,
            "continuing with over-allocated position ratios"
        );
    }

    let gateio_config = config
        .exchange("gateio")
        .ok_or("no gateio exchange configured in configs/config.yaml")?;
    let exchange: Arc<dyn ExchangeClient> = Arc::new(GateIoClient::new(gateio_config));
    info!(exchange = exchange.name(), "exchange client ready");

    let monitor = Arc::new(OrderMonitor::new(Arc::clone(&orders)));
    monitor
        .register_exchange(SPOT_EXCHANGE, Arc::clone(&exchange))
        .await;

    let mut engine = TradingEngine::new(
        Arc::clone(&monitor),
        Arc::clone(&registry),
        Arc::clone(&orders),
        Arc::clone(&contracts),
        Arc::new(OrderIdGenerator::new()),
    );
    engine.register_exchange(SPOT_EXCHANGE, Arc::clone(&exchange));
    let engine = Arc::new(engine);

    let account_cache = Arc::new(AccountValueCache::new());
    account_cache.refresh(exchange.as_ref()).await;

    let (queues, receivers) = signal_queues();
    spawn_process_drain(receivers.process_rx, Arc::clone(&engine), queues.clone());
    spawn_store_drain(receivers.store_rx, Arc::clone(&signals));

    let state = AppState {
        secret_key: config.server.secret_key.clone(),
        queues,
        signals,
        orders,
        contracts,
        strategies,
        registry,
        account_cache,
        exchange,
    };

    let app = api::router(state);
    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening for signals");

    axum::serve(listener, app).await?;
    Ok(())
}
