//! Inbound trading signal.
//!
//! Signals arrive as JSON from external alerting systems. Producers are
//! sloppy about types: `price` may be a number or a numeric string, and
//! `contractType` may be an integer or a string holding one. Both are
//! coerced during deserialization so the rest of the system only ever sees
//! numeric values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Contract type codes carried by inbound signals.
///
/// Only `Crypto` resolves to a venue; the other codes exist so foreign
/// signals can be stored and inspected, not traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractType {
    Stock,
    CommodityFuture,
    Etf,
    Crypto,
}

impl ContractType {
    pub fn code(&self) -> i64 {
        match self {
            ContractType::Stock => 1,
            ContractType::CommodityFuture => 2,
            ContractType::Etf => 3,
            ContractType::Crypto => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ContractType::Stock),
            2 => Some(ContractType::CommodityFuture),
            3 => Some(ContractType::Etf),
            4 => Some(ContractType::Crypto),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContractType::Stock => "stock",
            ContractType::CommodityFuture => "commodity-future",
            ContractType::Etf => "etf",
            ContractType::Crypto => "crypto",
        }
    }
}

impl Serialize for ContractType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for ContractType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IntOrString::deserialize(deserializer)?;
        let code = match raw {
            IntOrString::Int(n) => n,
            IntOrString::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid contract type: {s:?}")))?,
        };
        ContractType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown contract type code: {code}")))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Num(f64),
    Str(String),
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Num(n) => Ok(n),
        NumberOrString::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid price format: {s:?}"))),
    }
}

/// A trade request produced by an external signal source.
///
/// `secret_key` authenticates the webhook call and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    /// Assigned by the store on persist; `None` for freshly received signals.
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default, rename = "secretkey", skip_serializing)]
    pub secret_key: Option<String>,

    pub symbol: String,

    pub scode: String,

    #[serde(rename = "contractType")]
    pub contract_type: ContractType,

    #[serde(deserialize_with = "deserialize_price")]
    pub price: f64,

    pub action: String,

    pub alert_title: String,

    pub time_circle: String,

    pub strategy_id: String,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TradingSignal {
    /// The quote currency is the token after the `_` separator, e.g. `USDT`
    /// in `BTC_USDT`.
    pub fn quote_currency(&self) -> Option<&str> {
        self.symbol.split_once('_').map(|(_, quote)| quote)
    }

    /// The base currency is the token before the `_` separator.
    pub fn base_currency(&self) -> Option<&str> {
        self.symbol.split_once('_').map(|(base, _)| base)
    }
}
