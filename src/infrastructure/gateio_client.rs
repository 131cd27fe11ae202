//! Gate.io spot REST client.
//!
//! Implements the exchange-client contract over the Gate.io v4 API.
//! Private endpoints are signed with HMAC-SHA512 over
//! `method\npath\nquery\nsha512(body)\ntimestamp` per the v4 scheme.
//! Only the spot account is supported.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use tracing::debug;

use crate::config::ExchangeConfig;
use crate::domain::entities::position::Position;
use crate::domain::repositories::exchange_client::{
    Balance, ExchangeClient, ExchangeError, ExchangeResult, OrderRequest, OrderResponse,
};

const GATEIO_API_BASE: &str = "https://api.gateio.ws";
const API_PREFIX: &str = "/api/v4";

#[derive(Debug, Deserialize)]
struct Ticker {
    last: String,
}

#[derive(Debug, Deserialize)]
struct SpotAccount {
    currency: String,
    available: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct SpotOrder {
    id: String,
    status: String,
    amount: String,
    #[serde(default)]
    left: String,
    #[serde(default)]
    avg_deal_price: String,
    #[serde(default)]
    fee: String,
    #[serde(default)]
    fee_currency: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    label: String,
    #[serde(default)]
    message: String,
}

fn parse_decimal(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

/// Map a raw venue status to the system vocabulary. Gate.io reports a
/// completed order as `closed` whether it filled or was swept, so the fill
/// quantity decides between `filled` and `canceled`.
fn normalize_status(raw: &str, filled_qty: f64) -> String {
    match raw {
        "closed" => {
            if filled_qty > 0.0 {
                "filled".to_string()
            } else {
                "canceled".to_string()
            }
        }
        "cancelled" => "canceled".to_string(),
        other => other.to_string(),
    }
}

impl SpotOrder {
    fn into_response(self) -> OrderResponse {
        let amount = parse_decimal(&self.amount);
        let left = parse_decimal(&self.left);
        let filled_qty = (amount - left).max(0.0);

        OrderResponse {
            order_id: self.id,
            status: normalize_status(&self.status, filled_qty),
            filled_qty,
            filled_price: parse_decimal(&self.avg_deal_price),
            fee: parse_decimal(&self.fee),
            fee_currency: self.fee_currency,
        }
    }
}

pub struct GateIoClient {
    client: Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl GateIoClient {
    pub fn new(config: &ExchangeConfig) -> Self {
        let base_url = if config.base_url.is_empty() {
            GATEIO_API_BASE.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        GateIoClient {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url,
        }
    }

    fn auth_headers(
        &self,
        method: &str,
        path: &str,
        query: &str,
        body: &str,
    ) -> Result<HashMap<String, String>, ExchangeError> {
        let timestamp = Utc::now().timestamp().to_string();
        let body_hash = hex::encode(Sha512::digest(body.as_bytes()));
        let payload = format!("{method}\n{path}\n{query}\n{body_hash}\n{timestamp}");

        let mut mac = Hmac::<Sha512>::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ExchangeError::NetworkError(format!("hmac init failed: {e}")))?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HashMap::new();
        headers.insert("KEY".to_string(), self.api_key.clone());
        headers.insert("Timestamp".to_string(), timestamp);
        headers.insert("SIGN".to_string(), signature);
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Ok(headers)
    }

    async fn read_error(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ApiErrorBody>().await {
            Ok(body) if !body.label.is_empty() => {
                format!("{} - {}", body.label, body.message)
            }
            _ => format!("http status {status}"),
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: Option<(&str, String)>,
        body: Option<String>,
    ) -> Result<T, String> {
        let full_path = format!("{API_PREFIX}{path}");
        let query_string = query
            .as_ref()
            .map(|(key, value)| format!("{key}={value}"))
            .unwrap_or_default();
        let body_string = body.unwrap_or_default();

        let headers = self
            .auth_headers(method.as_str(), &full_path, &query_string, &body_string)
            .map_err(|e| e.to_string())?;

        let mut url = format!("{}{}", self.base_url, full_path);
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }

        debug!(method = %method, url = %url, "gate.io request");

        let mut request = self.client.request(method, &url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if !body_string.is_empty() {
            request = request.body(body_string);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        response.json::<T>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ExchangeClient for GateIoClient {
    fn name(&self) -> &str {
        "gateio"
    }

    async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64> {
        let url = format!(
            "{}{}/spot/tickers?currency_pair={}",
            self.base_url, API_PREFIX, symbol
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExchangeError::PriceQueryFailed(
                Self::read_error(response).await,
            ));
        }

        let tickers: Vec<Ticker> = response
            .json()
            .await
            .map_err(|e| ExchangeError::PriceQueryFailed(e.to_string()))?;

        let ticker = tickers
            .first()
            .ok_or_else(|| ExchangeError::PriceQueryFailed(format!("no ticker for {symbol}")))?;

        ticker
            .last
            .parse()
            .map_err(|_| ExchangeError::PriceQueryFailed(format!("bad price: {}", ticker.last)))
    }

    async fn get_balance(&self, currency: &str) -> ExchangeResult<Balance> {
        let accounts: Vec<SpotAccount> = self
            .send(
                reqwest::Method::GET,
                "/spot/accounts",
                Some(("currency", currency.to_string())),
                None,
            )
            .await
            .map_err(ExchangeError::BalanceQueryFailed)?;

        let balance = accounts
            .iter()
            .find(|account| account.currency == currency)
            .map(|account| {
                let available = parse_decimal(&account.available);
                let locked = parse_decimal(&account.locked);
                Balance {
                    currency: account.currency.clone(),
                    available,
                    total: available + locked,
                }
            })
            .unwrap_or(Balance {
                currency: currency.to_string(),
                available: 0.0,
                total: 0.0,
            });

        Ok(balance)
    }

    async fn list_balances(&self) -> ExchangeResult<Vec<Balance>> {
        let accounts: Vec<SpotAccount> = self
            .send(reqwest::Method::GET, "/spot/accounts", None, None)
            .await
            .map_err(ExchangeError::BalanceQueryFailed)?;

        Ok(accounts
            .into_iter()
            .map(|account| {
                let available = parse_decimal(&account.available);
                let locked = parse_decimal(&account.locked);
                Balance {
                    currency: account.currency,
                    available,
                    total: available + locked,
                }
            })
            .collect())
    }

    async fn get_position(&self, symbol: &str) -> ExchangeResult<Option<Position>> {
        let base = symbol
            .split_once('_')
            .map(|(base, _)| base)
            .ok_or_else(|| ExchangeError::InvalidOrder(format!("invalid symbol: {symbol}")))?;

        let balance = self.get_balance(base).await?;
        if balance.total > 0.0 {
            Ok(Some(Position::spot(symbol, balance.total)))
        } else {
            Ok(None)
        }
    }

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
        let body = serde_json::json!({
            "currency_pair": request.symbol,
            "side": request.side,
            "type": request.order_type,
            "account": "spot",
            "amount": format!("{:.8}", request.amount),
            "price": format!("{:.8}", request.price),
            "time_in_force": "gtc",
        });

        let order: SpotOrder = self
            .send(
                reqwest::Method::POST,
                "/spot/orders",
                None,
                Some(body.to_string()),
            )
            .await
            .map_err(ExchangeError::OrderPlacementFailed)?;

        Ok(order.into_response())
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        let _: SpotOrder = self
            .send(
                reqwest::Method::DELETE,
                &format!("/spot/orders/{order_id}"),
                Some(("currency_pair", symbol.to_string())),
                None,
            )
            .await
            .map_err(ExchangeError::OrderCancellationFailed)?;

        Ok(())
    }

    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> ExchangeResult<OrderResponse> {
        let order: SpotOrder = self
            .send(
                reqwest::Method::GET,
                &format!("/spot/orders/{order_id}"),
                Some(("currency_pair", symbol.to_string())),
                None,
            )
            .await
            .map_err(ExchangeError::OrderStatusFailed)?;

        Ok(order.into_response())
    }
}
