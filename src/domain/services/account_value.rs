//! Account valuation in quote currency.

use tracing::{debug, info, warn};

use crate::domain::repositories::exchange_client::{ExchangeClient, ExchangeError};

/// Total spot account value in USDT.
///
/// USDT balances count at parity; every other non-zero balance is converted
/// through its `<CCY>_USDT` last price. Currencies whose price lookup fails
/// are skipped rather than failing the whole sweep.
pub async fn total_account_value(exchange: &dyn ExchangeClient) -> Result<f64, ExchangeError> {
    let balances = exchange.list_balances().await?;

    let mut total = 0.0;
    for balance in balances {
        if balance.total <= 0.0 {
            continue;
        }

        if balance.currency == "USDT" {
            total += balance.total;
            debug!(
                currency = %balance.currency,
                amount = balance.total,
                running_total = total,
                "added quote balance"
            );
            continue;
        }

        match exchange
            .get_symbol_price(&format!("{}_USDT", balance.currency))
            .await
        {
            Ok(price) => {
                let value = balance.total * price;
                total += value;
                debug!(
                    currency = %balance.currency,
                    amount = balance.total,
                    price,
                    value,
                    running_total = total,
                    "added converted balance"
                );
            }
            Err(e) => {
                warn!(
                    currency = %balance.currency,
                    error = %e,
                    "price lookup failed, skipping currency"
                );
            }
        }
    }

    info!(total_value = total, "account valuation complete");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::MockExchange;

    #[tokio::test]
    async fn test_sums_usdt_at_parity_and_converts_others() {
        let exchange = MockExchange::new();
        exchange.set_balance("USDT", 1000.0, 1000.0).await;
        exchange.set_balance("BTC", 0.1, 0.2).await;
        exchange.set_price("BTC_USDT", 50000.0).await;

        let total = total_account_value(&exchange).await.unwrap();
        assert_eq!(total, 1000.0 + 0.2 * 50000.0);
    }

    #[tokio::test]
    async fn test_skips_currencies_without_price() {
        let exchange = MockExchange::new();
        exchange.set_balance("USDT", 500.0, 500.0).await;
        exchange.set_balance("OBSCURE", 10.0, 10.0).await;

        let total = total_account_value(&exchange).await.unwrap();
        assert_eq!(total, 500.0);
    }

    #[tokio::test]
    async fn test_ignores_empty_balances() {
        let exchange = MockExchange::new();
        exchange.set_balance("USDT", 0.0, 0.0).await;
        exchange.set_balance("BTC", 0.0, 0.0).await;
        exchange.set_price("BTC_USDT", 50000.0).await;

        let total = total_account_value(&exchange).await.unwrap();
        assert_eq!(total, 0.0);
    }
}
