//! Cached account valuation for the admin surface.
//!
//! Sizing always revalues through the exchange directly; this cache only
//! backs `/api/stats` and the manual refresh endpoint, so it is refreshed
//! once at startup and then on operator request.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::domain::repositories::exchange_client::ExchangeClient;
use crate::domain::services::account_value::total_account_value;

#[derive(Default)]
struct CacheState {
    value: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

pub struct AccountValueCache {
    state: RwLock<CacheState>,
}

impl Default for AccountValueCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountValueCache {
    pub fn new() -> Self {
        AccountValueCache {
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Last formatted valuation, or `"0.00"` before the first refresh.
    pub async fn get(&self) -> String {
        self.state
            .read()
            .await
            .value
            .clone()
            .unwrap_or_else(|| "0.00".to_string())
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.updated_at
    }

    /// Recompute the valuation and swap it in. A failed sweep keeps the
    /// previous value.
    pub async fn refresh(&self, exchange: &dyn ExchangeClient) {
        let total = match total_account_value(exchange).await {
            Ok(total) => total,
            Err(e) => {
                error!(error = %e, "account valuation refresh failed");
                return;
            }
        };

        let formatted = format!("{total:.2}");
        let now = Utc::now();
        {
            let mut state = self.state.write().await;
            state.value = Some(formatted.clone());
            state.updated_at = Some(now);
        }

        info!(value = %formatted, "account value cache updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::MockExchange;

    #[tokio::test]
    async fn test_default_value_before_refresh() {
        let cache = AccountValueCache::new();
        assert_eq!(cache.get().await, "0.00");
        assert!(cache.last_updated().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_formats_two_decimals() {
        let exchange = MockExchange::new();
        exchange.set_balance("USDT", 1234.5, 1234.5).await;
        exchange.set_balance("BTC", 0.0, 0.01).await;
        exchange.set_price("BTC_USDT", 50000.0).await;

        let cache = AccountValueCache::new();
        cache.refresh(&exchange).await;

        assert_eq!(cache.get().await, "1734.50");
        assert!(cache.last_updated().await.is_some());
    }

    #[tokio::test]
    async fn test_refresh_replaces_previous_value() {
        let cache = AccountValueCache::new();
        let exchange = MockExchange::new();

        exchange.set_balance("USDT", 100.0, 100.0).await;
        cache.refresh(&exchange).await;
        assert_eq!(cache.get().await, "100.00");

        exchange.set_balance("USDT", 250.0, 250.0).await;
        cache.refresh(&exchange).await;
        assert_eq!(cache.get().await, "250.00");
    }
}
