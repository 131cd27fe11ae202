//! Database record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::services::sizing::SymbolLimits;

/// Stored trading signal. The webhook secret is validated before admission
/// and never reaches this type.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SignalRecord {
    pub id: i64,
    pub symbol: String,
    pub scode: String,
    pub contract_type: i64,
    pub price: f64,
    pub action: String,
    pub alert_title: String,
    pub time_circle: String,
    pub strategy_id: String,
    pub created_at: DateTime<Utc>,
}

/// Stored order record, one row per placement attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderRecord {
    pub id: i64,
    pub system_order_id: String,
    /// Exchange-assigned id, or a `failed_<ts>_<signal>` placeholder when
    /// placement never produced one.
    pub order_id: String,
    pub strategy_id: i64,
    pub symbol: String,
    /// Venue kind the order went to ("spot").
    pub contract_type: String,
    /// Original contract type code carried by the signal.
    pub contract_code: String,
    pub order_type: String,
    pub price: f64,
    pub amount: f64,
    pub action: String,
    pub position_side: String,
    pub status: String,
    pub filled_price: f64,
    pub filled_amount: f64,
    pub fee: f64,
    pub fee_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order insert input.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub system_order_id: String,
    pub order_id: String,
    pub strategy_id: i64,
    pub symbol: String,
    pub contract_type: String,
    pub contract_code: String,
    pub order_type: String,
    pub price: f64,
    pub amount: f64,
    pub action: String,
    pub position_side: String,
    pub status: String,
}

/// Fill details persisted alongside a terminal status.
#[derive(Debug, Clone, Default)]
pub struct OrderFill {
    pub filled_price: f64,
    pub filled_amount: f64,
    pub fee: f64,
    pub fee_currency: String,
}

/// Stored strategy definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StrategyRecord {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Strategy create/update input.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStrategy {
    pub name: String,
    pub code: String,
    #[serde(default = "default_active")]
    pub status: bool,
}

/// Stored symbol configuration.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContractCodeRecord {
    pub id: i64,
    pub symbol: String,
    pub code: String,
    pub exchange_id: Option<i64>,
    pub min_amount: f64,
    pub amount_precision: i64,
    pub price_precision: i64,
    pub max_position_ratio: f64,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Symbol configuration create/update input.
#[derive(Debug, Clone, Deserialize)]
pub struct NewContractCode {
    pub symbol: String,
    pub code: String,
    #[serde(default)]
    pub exchange_id: Option<i64>,
    #[serde(default = "default_min_amount")]
    pub min_amount: f64,
    #[serde(default = "default_amount_precision")]
    pub amount_precision: i64,
    #[serde(default = "default_price_precision")]
    pub price_precision: i64,
    #[serde(default)]
    pub max_position_ratio: f64,
    #[serde(default = "default_active")]
    pub status: bool,
}

fn default_active() -> bool {
    true
}

fn default_min_amount() -> f64 {
    0.001
}

fn default_amount_precision() -> i64 {
    3
}

fn default_price_precision() -> i64 {
    5
}

impl From<&ContractCodeRecord> for SymbolLimits {
    fn from(record: &ContractCodeRecord) -> Self {
        SymbolLimits {
            min_amount: record.min_amount,
            amount_precision: record.amount_precision.max(0) as u32,
            max_position_ratio: record.max_position_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_code_defaults() {
        let input: NewContractCode =
            serde_json::from_str(r#"{"symbol": "BTC_USDT", "code": "BTC"}"#).unwrap();
        assert_eq!(input.min_amount, 0.001);
        assert_eq!(input.amount_precision, 3);
        assert_eq!(input.price_precision, 5);
        assert_eq!(input.max_position_ratio, 0.0);
        assert!(input.status);
    }

    #[test]
    fn test_symbol_limits_from_record() {
        let record = ContractCodeRecord {
            id: 1,
            symbol: "BTC_USDT".to_string(),
            code: "BTC".to_string(),
            exchange_id: None,
            min_amount: 0.01,
            amount_precision: 4,
            price_precision: 5,
            max_position_ratio: 25.0,
            status: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let limits = SymbolLimits::from(&record);
        assert_eq!(limits.min_amount, 0.01);
        assert_eq!(limits.amount_precision, 4);
        assert_eq!(limits.max_position_ratio, 25.0);
    }
}
