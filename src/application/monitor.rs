//! Order monitor.
//!
//! Every placed order gets one cooperative task that polls the venue until
//! the order reaches a terminal state or a hard timeout expires. On timeout
//! the monitor cancels the order defensively and reconciles the stored
//! record against whatever the venue reports, so the record never ends up
//! less advanced than the venue's view at the last observation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::domain::entities::order::status;
use crate::domain::repositories::exchange_client::{
    ExchangeClient, ExchangeError, OrderResponse,
};
use crate::persistence::models::{OrderFill, OrderRecord};
use crate::persistence::repository::OrderRepository;

/// Hard ceiling on how long an order is watched before a defensive cancel.
pub const MONITOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Status polling interval.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

pub struct OrderMonitor {
    active: Mutex<HashMap<String, OrderRecord>>,
    exchanges: RwLock<HashMap<String, Arc<dyn ExchangeClient>>>,
    orders: Arc<OrderRepository>,
}

impl OrderMonitor {
    pub fn new(orders: Arc<OrderRepository>) -> Self {
        OrderMonitor {
            active: Mutex::new(HashMap::new()),
            exchanges: RwLock::new(HashMap::new()),
            orders,
        }
    }

    pub async fn register_exchange(&self, venue: &str, client: Arc<dyn ExchangeClient>) {
        self.exchanges
            .write()
            .await
            .insert(venue.to_string(), client);
    }

    /// Orders currently under watch.
    pub async fn active_orders(&self) -> Vec<OrderRecord> {
        self.active.lock().await.values().cloned().collect()
    }

    /// Put an order under watch and spawn its monitoring task.
    pub async fn start(self: Arc<Self>, order: OrderRecord, venue: &str) {
        let exchange = { self.exchanges.read().await.get(venue).cloned() };
        let Some(exchange) = exchange else {
            error!(
                venue,
                order_id = %order.order_id,
                "unknown venue, order will not be monitored"
            );
            return;
        };

        self.active
            .lock()
            .await
            .insert(order.order_id.clone(), order.clone());

        let monitor = Arc::clone(&self);
        tokio::spawn(async move {
            let order_id = order.order_id.clone();
            monitor.watch(order, exchange).await;
            monitor.active.lock().await.remove(&order_id);
        });
    }

    /// Cancel an active order on operator request. Unknown ids are a no-op.
    pub async fn cancel(&self, order_id: &str) -> Result<(), ExchangeError> {
        let order = { self.active.lock().await.get(order_id).cloned() };
        let Some(order) = order else {
            return Ok(());
        };

        let exchange = {
            self.exchanges
                .read()
                .await
                .get(&order.contract_type)
                .cloned()
        };
        let Some(exchange) = exchange else {
            return Ok(());
        };

        if let Err(e) = exchange.cancel_order(&order.symbol, &order.order_id).await {
            error!(order_id = %order.order_id, error = %e, "manual cancel failed");
            return Err(e);
        }

        self.persist_status(order_id, status::CANCELED).await;
        self.active.lock().await.remove(order_id);
        info!(order_id, "order canceled manually");
        Ok(())
    }

    async fn watch(&self, order: OrderRecord, exchange: Arc<dyn ExchangeClient>) {
        let timeout = tokio::time::sleep(MONITOR_TIMEOUT);
        tokio::pin!(timeout);
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + MONITOR_INTERVAL,
            MONITOR_INTERVAL,
        );

        let mut last_observed: Option<OrderResponse> = None;

        loop {
            tokio::select! {
                biased;

                () = &mut timeout => {
                    self.reconcile_timeout(&order, exchange.as_ref(), last_observed).await;
                    return;
                }

                _ = ticker.tick() => {
                    let response = match exchange
                        .get_order_status(&order.symbol, &order.order_id)
                        .await
                    {
                        Ok(response) => response,
                        Err(e) => {
                            error!(
                                order_id = %order.order_id,
                                error = %e,
                                "order status poll failed"
                            );
                            continue;
                        }
                    };

                    let previous = match self.orders.get_status(&order.order_id).await {
                        Ok(previous) => previous,
                        Err(e) => {
                            error!(
                                order_id = %order.order_id,
                                error = %e,
                                "failed to read stored order status"
                            );
                            None
                        }
                    };

                    if previous.as_deref() != Some(response.status.as_str()) {
                        info!(
                            order_id = %order.order_id,
                            symbol = %order.symbol,
                            previous_status = previous.as_deref().unwrap_or(""),
                            current_status = %response.status,
                            filled_amount = response.filled_qty,
                            filled_price = response.filled_price,
                            fee = response.fee,
                            "order status changed"
                        );
                    }

                    if response.status == status::FILLED {
                        self.persist_fill(&order.order_id, status::FILLED, &response).await;
                    } else {
                        self.persist_status(&order.order_id, &response.status).await;
                    }

                    let terminal = response.status == status::FILLED
                        || response.status == status::CANCELED;
                    last_observed = Some(response);

                    if terminal {
                        info!(
                            order_id = %order.order_id,
                            symbol = %order.symbol,
                            "order monitoring finished"
                        );
                        return;
                    }
                }
            }
        }
    }

    /// Timeout path: requery, then cancel, then reconcile against the
    /// venue's final word.
    async fn reconcile_timeout(
        &self,
        order: &OrderRecord,
        exchange: &dyn ExchangeClient,
        mut last_observed: Option<OrderResponse>,
    ) {
        match exchange
            .get_order_status(&order.symbol, &order.order_id)
            .await
        {
            Ok(response) => {
                if response.status == status::FILLED {
                    info!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        "order filled before timeout cancel"
                    );
                    self.persist_fill(&order.order_id, status::FILLED, &response).await;
                    return;
                }
                if response.status == status::CANCELED {
                    info!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        "order already canceled, nothing to do"
                    );
                    return;
                }
                if response.filled_qty > 0.0 && response.filled_qty < order.amount {
                    warn!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        filled_amount = response.filled_qty,
                        total_amount = order.amount,
                        "order partially filled, canceling the remainder"
                    );
                }
                last_observed = Some(response);
            }
            Err(e) => {
                // Proceed to cancel anyway; the venue remains authoritative.
                // The tick-loop snapshot is stale at this point and must not
                // drive a partial-fill promotion.
                last_observed = None;
                error!(
                    order_id = %order.order_id,
                    error = %e,
                    "status query before timeout cancel failed"
                );
            }
        }

        warn!(
            order_id = %order.order_id,
            symbol = %order.symbol,
            "monitor timeout, canceling order"
        );

        match exchange.cancel_order(&order.symbol, &order.order_id).await {
            Ok(()) => {
                info!(order_id = %order.order_id, symbol = %order.symbol, "cancel accepted");
                match &last_observed {
                    Some(observed) if observed.filled_qty > 0.0 => {
                        self.persist_fill(&order.order_id, status::PARTIALLY_FILLED, observed)
                            .await;
                    }
                    _ => self.persist_status(&order.order_id, status::CANCELED).await,
                }
            }
            Err(e) => {
                if e.is_order_not_found() {
                    warn!(
                        order_id = %order.order_id,
                        error = %e,
                        "cancel failed, order unknown to venue, requerying"
                    );
                } else {
                    error!(order_id = %order.order_id, error = %e, "cancel failed, requerying");
                }
                self.reconcile_after_failed_cancel(order, exchange, last_observed.as_ref())
                    .await;
            }
        }
    }

    async fn reconcile_after_failed_cancel(
        &self,
        order: &OrderRecord,
        exchange: &dyn ExchangeClient,
        last_observed: Option<&OrderResponse>,
    ) {
        match exchange
            .get_order_status(&order.symbol, &order.order_id)
            .await
        {
            Ok(latest) => {
                if latest.status == status::FILLED {
                    info!(
                        order_id = %order.order_id,
                        filled_amount = latest.filled_qty,
                        filled_price = latest.filled_price,
                        "cancel failed because the order had filled"
                    );
                    self.persist_fill(&order.order_id, status::FILLED, &latest).await;
                } else if latest.status == status::CANCELED {
                    info!(order_id = %order.order_id, "cancel failed, order already canceled");
                    if latest.filled_qty > 0.0 {
                        self.persist_fill(&order.order_id, status::PARTIALLY_FILLED, &latest)
                            .await;
                    } else {
                        self.persist_status(&order.order_id, status::CANCELED).await;
                    }
                } else if latest.filled_qty > 0.0 {
                    info!(
                        order_id = %order.order_id,
                        filled_amount = latest.filled_qty,
                        total_amount = order.amount,
                        "cancel failed with a partial fill on the books"
                    );
                    self.persist_fill(&order.order_id, status::PARTIALLY_FILLED, &latest)
                        .await;
                }
            }
            Err(e) => {
                error!(
                    order_id = %order.order_id,
                    error = %e,
                    "status query after failed cancel also failed"
                );
                if let Some(observed) = last_observed {
                    if observed.filled_qty > 0.0 {
                        self.persist_fill(&order.order_id, status::PARTIALLY_FILLED, observed)
                            .await;
                    }
                }
            }
        }
    }

    async fn persist_status(&self, order_id: &str, new_status: &str) {
        if let Err(e) = self.orders.update_status(order_id, new_status).await {
            error!(order_id, error = %e, "failed to persist order status");
        }
    }

    async fn persist_fill(&self, order_id: &str, new_status: &str, observed: &OrderResponse) {
        let fill = OrderFill {
            filled_price: observed.filled_price,
            filled_amount: observed.filled_qty,
            fee: observed.fee,
            fee_currency: observed.fee_currency.clone(),
        };
        if let Err(e) = self.orders.update_fill(order_id, new_status, &fill).await {
            error!(order_id, error = %e, "failed to persist order fill");
        }
    }
}
