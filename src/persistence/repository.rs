//! Data access layer for signals, orders, strategies, and symbol
//! configuration.

use chrono::Utc;
use tracing::{debug, error};

use super::models::*;
use super::{DatabaseError, DbPool};
use crate::domain::entities::signal::TradingSignal;

/// Pagination input shared by the list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 500)
    }
}

/// Trading signal repository.
#[derive(Clone)]
pub struct SignalRepository {
    pool: DbPool,
}

impl SignalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Persist a signal. The secret is intentionally not part of the insert.
    pub async fn insert(&self, signal: &TradingSignal) -> Result<i64, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO trading_signals
                (symbol, scode, contract_type, price, action, alert_title, time_circle, strategy_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&signal.symbol)
        .bind(&signal.scode)
        .bind(signal.contract_type.code())
        .bind(signal.price)
        .bind(&signal.action)
        .bind(&signal.alert_title)
        .bind(&signal.time_circle)
        .bind(&signal.strategy_id)
        .bind(signal.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(symbol = %signal.symbol, error = %e, "failed to store signal");
            DatabaseError::QueryError(format!("failed to store signal: {e}"))
        })?;

        let id = result.last_insert_rowid();
        debug!(id, symbol = %signal.symbol, "stored signal");
        Ok(id)
    }

    /// Most recent stored signal for a symbol, optionally excluding one id.
    pub async fn latest_by_symbol(
        &self,
        symbol: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<SignalRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, SignalRecord>(
            r#"
            SELECT * FROM trading_signals
            WHERE symbol = ?1 AND (?2 IS NULL OR id != ?2)
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(exclude_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to query latest signal: {e}")))?;

        Ok(record)
    }

    pub async fn get(&self, id: i64) -> Result<Option<SignalRecord>, DatabaseError> {
        sqlx::query_as::<_, SignalRecord>("SELECT * FROM trading_signals WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to get signal: {e}")))
    }

    /// Page of signals, newest first, optionally filtered by symbol/action.
    pub async fn list(
        &self,
        page: Page,
        symbol: Option<&str>,
        action: Option<&str>,
    ) -> Result<(Vec<SignalRecord>, i64), DatabaseError> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM trading_signals
            WHERE (?1 IS NULL OR symbol = ?1) AND (?2 IS NULL OR action = ?2)
            "#,
        )
        .bind(symbol)
        .bind(action)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to count signals: {e}")))?;

        let records = sqlx::query_as::<_, SignalRecord>(
            r#"
            SELECT * FROM trading_signals
            WHERE (?1 IS NULL OR symbol = ?1) AND (?2 IS NULL OR action = ?2)
            ORDER BY created_at DESC, id DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(symbol)
        .bind(action)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to list signals: {e}")))?;

        Ok((records, total))
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trading_signals")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to count signals: {e}")))?;
        Ok(count)
    }
}

/// Order record repository.
///
/// Status updates are guarded so a terminal row is never overwritten; the
/// monitor decides the final status before writing it.
#[derive(Clone)]
pub struct OrderRepository {
    pool: DbPool,
}

impl OrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, order: NewOrder) -> Result<OrderRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            INSERT INTO order_records
                (system_order_id, order_id, strategy_id, symbol, contract_type, contract_code,
                 order_type, price, amount, action, position_side, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            RETURNING *
            "#,
        )
        .bind(&order.system_order_id)
        .bind(&order.order_id)
        .bind(order.strategy_id)
        .bind(&order.symbol)
        .bind(&order.contract_type)
        .bind(&order.contract_code)
        .bind(&order.order_type)
        .bind(order.price)
        .bind(order.amount)
        .bind(&order.action)
        .bind(&order.position_side)
        .bind(&order.status)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(order_id = %order.order_id, error = %e, "failed to store order record");
            DatabaseError::QueryError(format!("failed to store order record: {e}"))
        })?;

        debug!(order_id = %record.order_id, status = %record.status, "stored order record");
        Ok(record)
    }

    pub async fn get_status(&self, order_id: &str) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT status FROM order_records WHERE order_id = ?1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryError(format!("failed to get order status: {e}")))?;
        Ok(row.map(|(status,)| status))
    }

    /// Record a status observation. Terminal rows are left untouched.
    pub async fn update_status(&self, order_id: &str, new_status: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE order_records
            SET status = ?1, updated_at = ?2
            WHERE order_id = ?3
              AND status NOT IN ('filled', 'canceled', 'partially_filled', 'failed')
            "#,
        )
        .bind(new_status)
        .bind(Utc::now())
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to update order status: {e}")))?;

        Ok(())
    }

    /// Record a terminal status together with its fill details.
    pub async fn update_fill(
        &self,
        order_id: &str,
        new_status: &str,
        fill: &OrderFill,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE order_records
            SET status = ?1, filled_price = ?2, filled_amount = ?3, fee = ?4,
                fee_currency = ?5, updated_at = ?6
            WHERE order_id = ?7
              AND status NOT IN ('filled', 'canceled', 'partially_filled', 'failed')
            "#,
        )
        .bind(new_status)
        .bind(fill.filled_price)
        .bind(fill.filled_amount)
        .bind(fill.fee)
        .bind(&fill.fee_currency)
        .bind(Utc::now())
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to update order fill: {e}")))?;

        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<OrderRecord>, DatabaseError> {
        sqlx::query_as::<_, OrderRecord>("SELECT * FROM order_records WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to get order: {e}")))
    }

    pub async fn get_by_order_id(&self, order_id: &str) -> Result<Option<OrderRecord>, DatabaseError> {
        sqlx::query_as::<_, OrderRecord>("SELECT * FROM order_records WHERE order_id = ?1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to get order: {e}")))
    }

    /// Page of orders, most recently updated first, with optional filters.
    pub async fn list(
        &self,
        page: Page,
        symbol: Option<&str>,
        action: Option<&str>,
        order_status: Option<&str>,
    ) -> Result<(Vec<OrderRecord>, i64), DatabaseError> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM order_records
            WHERE (?1 IS NULL OR symbol = ?1)
              AND (?2 IS NULL OR action = ?2)
              AND (?3 IS NULL OR status = ?3)
            "#,
        )
        .bind(symbol)
        .bind(action)
        .bind(order_status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to count orders: {e}")))?;

        let records = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT * FROM order_records
            WHERE (?1 IS NULL OR symbol = ?1)
              AND (?2 IS NULL OR action = ?2)
              AND (?3 IS NULL OR status = ?3)
            ORDER BY updated_at DESC, id DESC
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(symbol)
        .bind(action)
        .bind(order_status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to list orders: {e}")))?;

        Ok((records, total))
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to count orders: {e}")))?;
        Ok(count)
    }
}

/// Strategy definition repository.
#[derive(Clone)]
pub struct StrategyRepository {
    pool: DbPool,
}

impl StrategyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<StrategyRecord>, DatabaseError> {
        sqlx::query_as::<_, StrategyRecord>("SELECT * FROM strategies ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to list strategies: {e}")))
    }

    pub async fn get(&self, id: i64) -> Result<Option<StrategyRecord>, DatabaseError> {
        sqlx::query_as::<_, StrategyRecord>("SELECT * FROM strategies WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to get strategy: {e}")))
    }

    pub async fn create(&self, input: NewStrategy) -> Result<StrategyRecord, DatabaseError> {
        let now = Utc::now();
        sqlx::query_as::<_, StrategyRecord>(
            r#"
            INSERT INTO strategies (name, code, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.code)
        .bind(input.status)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to create strategy: {e}")))
    }

    pub async fn update(
        &self,
        id: i64,
        input: NewStrategy,
    ) -> Result<Option<StrategyRecord>, DatabaseError> {
        sqlx::query_as::<_, StrategyRecord>(
            r#"
            UPDATE strategies
            SET name = ?1, code = ?2, status = ?3, updated_at = ?4
            WHERE id = ?5
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.code)
        .bind(input.status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to update strategy: {e}")))
    }

    pub async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM strategies WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to delete strategy: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Symbol configuration repository.
#[derive(Clone)]
pub struct ContractCodeRepository {
    pool: DbPool,
}

impl ContractCodeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_symbol(
        &self,
        symbol: &str,
    ) -> Result<Option<ContractCodeRecord>, DatabaseError> {
        sqlx::query_as::<_, ContractCodeRecord>("SELECT * FROM contract_codes WHERE symbol = ?1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to get contract code: {e}")))
    }

    pub async fn list_active(&self) -> Result<Vec<ContractCodeRecord>, DatabaseError> {
        sqlx::query_as::<_, ContractCodeRecord>(
            "SELECT * FROM contract_codes WHERE status = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to list contract codes: {e}")))
    }

    pub async fn list(&self, page: Page) -> Result<(Vec<ContractCodeRecord>, i64), DatabaseError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contract_codes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to count contract codes: {e}")))?;

        let records = sqlx::query_as::<_, ContractCodeRecord>(
            "SELECT * FROM contract_codes ORDER BY id LIMIT ?1 OFFSET ?2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to list contract codes: {e}")))?;

        Ok((records, total))
    }

    pub async fn get(&self, id: i64) -> Result<Option<ContractCodeRecord>, DatabaseError> {
        sqlx::query_as::<_, ContractCodeRecord>("SELECT * FROM contract_codes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to get contract code: {e}")))
    }

    pub async fn create(
        &self,
        input: NewContractCode,
    ) -> Result<ContractCodeRecord, DatabaseError> {
        let now = Utc::now();
        sqlx::query_as::<_, ContractCodeRecord>(
            r#"
            INSERT INTO contract_codes
                (symbol, code, exchange_id, min_amount, amount_precision, price_precision,
                 max_position_ratio, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            RETURNING *
            "#,
        )
        .bind(&input.symbol)
        .bind(&input.code)
        .bind(input.exchange_id)
        .bind(input.min_amount)
        .bind(input.amount_precision)
        .bind(input.price_precision)
        .bind(input.max_position_ratio)
        .bind(input.status)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to create contract code: {e}")))
    }

    pub async fn update(
        &self,
        id: i64,
        input: NewContractCode,
    ) -> Result<Option<ContractCodeRecord>, DatabaseError> {
        sqlx::query_as::<_, ContractCodeRecord>(
            r#"
            UPDATE contract_codes
            SET symbol = ?1, code = ?2, exchange_id = ?3, min_amount = ?4,
                amount_precision = ?5, price_precision = ?6, max_position_ratio = ?7,
                status = ?8, updated_at = ?9
            WHERE id = ?10
            RETURNING *
            "#,
        )
        .bind(&input.symbol)
        .bind(&input.code)
        .bind(input.exchange_id)
        .bind(input.min_amount)
        .bind(input.amount_precision)
        .bind(input.price_precision)
        .bind(input.max_position_ratio)
        .bind(input.status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("failed to update contract code: {e}")))
    }

    pub async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM contract_codes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("failed to delete contract code: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::{ContractType, TradingSignal};
    use crate::persistence::init_database;

    fn sample_signal(symbol: &str, action: &str) -> TradingSignal {
        TradingSignal {
            id: None,
            secret_key: Some("never-stored".to_string()),
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

    fn sample_order(order_id: &str) -> NewOrder {
        NewOrder {
            system_order_id: format!("sys_{order_id}"),
            order_id: order_id.to_string(),
            strategy_id: 1,
            symbol: "BTC_USDT".to_string(),
            contract_type: "spot".to_string(),
            contract_code: "4".to_string(),
            order_type: "limit".to_string(),
            price: 50000.0,
            amount: 0.02,
            action: "buy".to_string(),
            position_side: "open".to_string(),
            status: "open".to_string(),
        }
    }

    #[tokio::test]
    async fn test_signal_roundtrip_without_secret() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = SignalRepository::new(pool.clone());

        let id = repo.insert(&sample_signal("BTC_USDT", "buy")).await.unwrap();
        let stored = repo.get(id).await.unwrap().unwrap();
        assert_eq!(stored.symbol, "BTC_USDT");
        assert_eq!(stored.contract_type, 4);

        // The schema has no secret column at all.
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pragma_table_info('trading_signals') WHERE name LIKE '%secret%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_latest_by_symbol_excludes_id() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = SignalRepository::new(pool);

        let first = repo.insert(&sample_signal("BTC_USDT", "buy")).await.unwrap();
        let second = repo
            .insert(&sample_signal("BTC_USDT", "sell"))
            .await
            .unwrap();
        repo.insert(&sample_signal("ETH_USDT", "buy")).await.unwrap();

        let latest = repo.latest_by_symbol("BTC_USDT", None).await.unwrap().unwrap();
        assert_eq!(latest.id, second);

        let prior = repo
            .latest_by_symbol("BTC_USDT", Some(second))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prior.id, first);

        let none = repo.latest_by_symbol("DOGE_USDT", None).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_signal_pagination_and_filters() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = SignalRepository::new(pool);

        for i in 0..5 {
            let action = if i % 2 == 0 { "buy" } else { "sell" };
            repo.insert(&sample_signal("BTC_USDT", action)).await.unwrap();
        }

        let (all, total) = repo
            .list(Page { page: 1, page_size: 3 }, None, None)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(all.len(), 3);

        let (buys, buy_total) = repo
            .list(Page { page: 1, page_size: 10 }, Some("BTC_USDT"), Some("buy"))
            .await
            .unwrap();
        assert_eq!(buy_total, 3);
        assert!(buys.iter().all(|s| s.action == "buy"));
    }

    #[tokio::test]
    async fn test_order_insert_and_status_update() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = OrderRepository::new(pool);

        let record = repo.insert(sample_order("ex-1")).await.unwrap();
        assert_eq!(record.status, "open");
        assert_eq!(record.filled_amount, 0.0);

        repo.update_status("ex-1", "pending").await.unwrap();
        assert_eq!(repo.get_status("ex-1").await.unwrap().unwrap(), "pending");
    }

    #[tokio::test]
    async fn test_terminal_status_is_never_demoted() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = OrderRepository::new(pool);

        repo.insert(sample_order("ex-1")).await.unwrap();
        let fill = OrderFill {
            filled_price: 50000.0,
            filled_amount: 0.02,
            fee: 1.0,
            fee_currency: "USDT".to_string(),
        };
        repo.update_fill("ex-1", "filled", &fill).await.unwrap();

        repo.update_status("ex-1", "open").await.unwrap();
        repo.update_fill("ex-1", "canceled", &OrderFill::default())
            .await
            .unwrap();

        let record = repo.get_by_order_id("ex-1").await.unwrap().unwrap();
        assert_eq!(record.status, "filled");
        assert_eq!(record.filled_amount, 0.02);
        assert_eq!(record.fee_currency, "USDT");
    }

    #[tokio::test]
    async fn test_duplicate_order_id_rejected() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = OrderRepository::new(pool);

        repo.insert(sample_order("ex-1")).await.unwrap();
        let mut duplicate = sample_order("ex-1");
        duplicate.system_order_id = "sys_other".to_string();
        assert!(repo.insert(duplicate).await.is_err());
    }

    #[tokio::test]
    async fn test_order_list_filters() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = OrderRepository::new(pool);

        repo.insert(sample_order("ex-1")).await.unwrap();
        let mut sell = sample_order("ex-2");
        sell.system_order_id = "sys_ex-2".to_string();
        sell.action = "sell".to_string();
        repo.insert(sell).await.unwrap();

        let (sells, total) = repo
            .list(Page { page: 1, page_size: 10 }, None, Some("sell"), None)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(sells[0].order_id, "ex-2");

        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_strategy_crud() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = StrategyRepository::new(pool);

        // Seeded trending definition is present.
        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "trending");

        let created = repo
            .create(NewStrategy {
                name: "grid".to_string(),
                code: "grid".to_string(),
                status: false,
            })
            .await
            .unwrap();
        assert!(!created.status);

        let updated = repo
            .update(
                created.id,
                NewStrategy {
                    name: "grid".to_string(),
                    code: "grid-v2".to_string(),
                    status: true,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.code, "grid-v2");
        assert!(updated.status);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_contract_code_crud() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let repo = ContractCodeRepository::new(pool);

        let created = repo
            .create(NewContractCode {
                symbol: "BTC_USDT".to_string(),
                code: "BTC".to_string(),
                exchange_id: Some(1),
                min_amount: 0.001,
                amount_precision: 3,
                price_precision: 5,
                max_position_ratio: 20.0,
                status: true,
            })
            .await
            .unwrap();

        let found = repo.find_by_symbol("BTC_USDT").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.max_position_ratio, 20.0);

        let mut input = NewContractCode {
            symbol: "BTC_USDT".to_string(),
            code: "BTC".to_string(),
            exchange_id: Some(1),
            min_amount: 0.01,
            amount_precision: 2,
            price_precision: 5,
            max_position_ratio: 30.0,
            status: false,
        };
        let updated = repo.update(created.id, input.clone()).await.unwrap().unwrap();
        assert_eq!(updated.min_amount, 0.01);
        assert!(!updated.status);
        assert!(repo.list_active().await.unwrap().is_empty());

        input.status = true;
        repo.update(created.id, input).await.unwrap();
        assert_eq!(repo.list_active().await.unwrap().len(), 1);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.find_by_symbol("BTC_USDT").await.unwrap().is_none());
    }
}
