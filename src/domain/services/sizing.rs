//! Order sizing engine.
//!
//! Turns a validated signal into final spot order parameters. The decision
//! is position-aware: a flat book opens, an existing position adds on a buy
//! and reduces on a sell, all under the symbol's share of total account
//! value (`max_position_ratio`). Quantities are truncated to the symbol's
//! amount precision and checked against its minimum lot.
//!
//! The branch logic is pure and fully unit-tested; `determine_spot_order`
//! is the thin async wrapper that gathers position, valuation, and balance
//! from the venue.

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::entities::order::{OrderParams, PositionSide};
use crate::domain::entities::signal::TradingSignal;
use crate::domain::repositories::exchange_client::{ExchangeClient, ExchangeError};
use crate::domain::services::account_value::total_account_value;

/// Share of the symbol's remaining funds committed on a first open.
pub const INITIAL_OPEN_RATIO: f64 = 0.50;

/// Share of the remaining funds committed when adding to a position.
pub const ADD_OPEN_RATIO: f64 = 0.98;

/// Share of the position closed on a sell signal.
pub const CLOSE_RATIO: f64 = 0.50;

/// At or below this fraction of the symbol cap, a sell closes the whole
/// position instead of half.
pub const MIN_POSITION_RATIO_THRESHOLD: f64 = 0.40;

/// Adds are refused when the remaining headroom falls below this fraction
/// of the symbol cap.
pub const MIN_ADD_RATIO_THRESHOLD: f64 = 0.10;

/// Per-symbol trading limits, sourced from the symbol configuration store.
#[derive(Debug, Clone)]
pub struct SymbolLimits {
    /// Minimum order quantity in base asset.
    pub min_amount: f64,
    /// Decimal places kept when rounding quantities.
    pub amount_precision: u32,
    /// Percent of total account value this symbol may occupy.
    pub max_position_ratio: f64,
}

#[derive(Debug, Error)]
pub enum SizingError {
    #[error("symbol not configured: {0}")]
    SymbolNotFound(String),

    #[error("invalid symbol format: {0}")]
    InvalidSymbol(String),

    #[error("position cap reached for {symbol}: remaining funds {remaining:.2}")]
    ExceedMaxPosition { symbol: String, remaining: f64 },

    #[error("insufficient {currency} balance: need {needed:.2}, available {available:.2}")]
    InsufficientBalance {
        currency: String,
        needed: f64,
        available: f64,
    },

    #[error("remaining headroom ratio {ratio:.4} below add threshold {threshold:.2}")]
    InsufficientAddRatio { ratio: f64, threshold: f64 },

    #[error("no position to sell for {0}")]
    NoPositionToSell(String),

    #[error("amount {amount} below minimum lot {min_amount} for {symbol}")]
    AmountBelowMin {
        symbol: String,
        amount: f64,
        min_amount: f64,
    },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl SizingError {
    /// Stable machine-readable code, used in logs and surfaced to operators.
    pub fn code(&self) -> &'static str {
        match self {
            SizingError::SymbolNotFound(_) => "SYMBOL_NOT_FOUND",
            SizingError::InvalidSymbol(_) => "INVALID_SYMBOL",
            SizingError::ExceedMaxPosition { .. } => "EXCEED_MAX_POSITION",
            SizingError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            SizingError::InsufficientAddRatio { .. } => "INSUFFICIENT_ADD_RATIO",
            SizingError::NoPositionToSell(_) => "NO_POSITION_TO_SELL",
            SizingError::AmountBelowMin { .. } => "AMOUNT_BELOW_MIN",
            SizingError::Exchange(_) => "EXCHANGE_ERROR",
        }
    }
}

/// Truncate a quantity toward zero at the symbol's amount precision.
///
/// Returns 0 when the truncated quantity falls below the minimum lot, which
/// callers treat as "do not place".
pub fn round_amount(amount: f64, limits: &SymbolLimits) -> f64 {
    let factor = 10f64.powi(limits.amount_precision as i32);
    let truncated = (amount * factor).trunc() / factor;
    if truncated < limits.min_amount {
        0.0
    } else {
        truncated
    }
}

/// Size a first open (flat book, buy signal).
pub fn size_open(
    symbol: &str,
    price: f64,
    limits: &SymbolLimits,
    total_value: f64,
    available_quote: f64,
    quote_currency: &str,
) -> Result<f64, SizingError> {
    size_buy(
        symbol,
        price,
        limits,
        total_value,
        0.0,
        available_quote,
        quote_currency,
        INITIAL_OPEN_RATIO,
        None,
    )
}

/// Size an add (existing position, buy signal).
pub fn size_add(
    symbol: &str,
    price: f64,
    limits: &SymbolLimits,
    total_value: f64,
    position_value: f64,
    available_quote: f64,
    quote_currency: &str,
) -> Result<f64, SizingError> {
    size_buy(
        symbol,
        price,
        limits,
        total_value,
        position_value,
        available_quote,
        quote_currency,
        ADD_OPEN_RATIO,
        Some(MIN_ADD_RATIO_THRESHOLD),
    )
}

#[allow(clippy::too_many_arguments)]
fn size_buy(
    symbol: &str,
    price: f64,
    limits: &SymbolLimits,
    total_value: f64,
    position_value: f64,
    available_quote: f64,
    quote_currency: &str,
    open_ratio: f64,
    add_threshold: Option<f64>,
) -> Result<f64, SizingError> {
    let max_position_value = total_value * limits.max_position_ratio / 100.0;
    let remaining = max_position_value - position_value;

    if remaining <= 0.0 {
        return Err(SizingError::ExceedMaxPosition {
            symbol: symbol.to_string(),
            remaining,
        });
    }

    if let Some(threshold) = add_threshold {
        let remaining_ratio = remaining / max_position_value;
        if remaining_ratio < threshold {
            return Err(SizingError::InsufficientAddRatio {
                ratio: remaining_ratio,
                threshold,
            });
        }
    }

    let desired = remaining * open_ratio;
    if available_quote < desired {
        return Err(SizingError::InsufficientBalance {
            currency: quote_currency.to_string(),
            needed: desired,
            available: available_quote,
        });
    }

    let amount = round_amount(desired / price, limits);
    if amount <= 0.0 {
        return Err(SizingError::AmountBelowMin {
            symbol: symbol.to_string(),
            amount: desired / price,
            min_amount: limits.min_amount,
        });
    }

    Ok(amount)
}

/// Size a close (existing position, sell signal).
///
/// `max_position_value` is `None` when account valuation failed; the
/// degraded path closes at the fixed ratio with no small-position check and
/// no minimum-lot lift.
pub fn size_close(
    symbol: &str,
    price: f64,
    position_size: f64,
    limits: &SymbolLimits,
    max_position_value: Option<f64>,
) -> Result<f64, SizingError> {
    let Some(cap) = max_position_value else {
        let raw_close = position_size * CLOSE_RATIO;
        let amount = round_amount(raw_close, limits);
        if amount <= 0.0 {
            return Err(SizingError::AmountBelowMin {
                symbol: symbol.to_string(),
                amount: raw_close,
                min_amount: limits.min_amount,
            });
        }
        return Ok(amount);
    };

    let raw_close = if cap > 0.0 {
        let position_ratio = position_size * price / cap;
        if position_ratio <= MIN_POSITION_RATIO_THRESHOLD {
            // Small positions are closed outright so dust does not
            // accumulate under the minimum lot.
            position_size
        } else {
            position_size * CLOSE_RATIO
        }
    } else {
        position_size * CLOSE_RATIO
    };

    let adjusted = if raw_close < limits.min_amount {
        if position_size >= limits.min_amount {
            info!(
                symbol,
                raw_close,
                min_amount = limits.min_amount,
                "close below minimum lot, lifting to minimum"
            );
            limits.min_amount
        } else {
            info!(
                symbol,
                position_size,
                min_amount = limits.min_amount,
                "position below minimum lot, closing in full"
            );
            position_size
        }
    } else {
        raw_close
    };

    let amount = round_amount(adjusted, limits);
    if amount <= 0.0 {
        return Err(SizingError::AmountBelowMin {
            symbol: symbol.to_string(),
            amount: adjusted,
            min_amount: limits.min_amount,
        });
    }

    Ok(amount)
}

/// Determine final spot order parameters for a validated signal.
///
/// Fetches the current position, account valuation, and quote balance from
/// the venue, then applies the open/add/close rules above.
pub async fn determine_spot_order(
    signal: &TradingSignal,
    exchange: &dyn ExchangeClient,
    limits: &SymbolLimits,
) -> Result<OrderParams, SizingError> {
    let quote_currency = signal
        .quote_currency()
        .ok_or_else(|| SizingError::InvalidSymbol(signal.symbol.clone()))?;

    let position = exchange.get_position(&signal.symbol).await?;
    let held = position.as_ref().filter(|p| p.size > 0.0);

    let mut params = OrderParams {
        symbol: signal.symbol.clone(),
        price: signal.price,
        action: signal.action.clone(),
        order_type: "limit".to_string(),
        position_side: PositionSide::Open,
        amount: 0.0,
    };

    match (held, signal.action.as_str()) {
        (None, "sell") => Err(SizingError::NoPositionToSell(signal.symbol.clone())),

        (None, _) => {
            info!(symbol = %signal.symbol, "no existing position, opening");
            let (total_value, available) =
                fetch_buy_inputs(exchange, quote_currency).await?;
            params.amount = size_open(
                &signal.symbol,
                signal.price,
                limits,
                total_value,
                available,
                quote_currency,
            )?;
            Ok(params)
        }

        (Some(position), "sell") => {
            let cap = match total_account_value(exchange).await {
                Ok(total_value) => Some(total_value * limits.max_position_ratio / 100.0),
                Err(e) => {
                    warn!(
                        symbol = %signal.symbol,
                        error = %e,
                        "account valuation failed, closing at fixed ratio"
                    );
                    None
                }
            };
            params.position_side = PositionSide::Close;
            params.amount =
                size_close(&signal.symbol, signal.price, position.size, limits, cap)?;
            info!(
                symbol = %signal.symbol,
                position_size = position.size,
                close_amount = params.amount,
                "existing position with sell signal, reducing"
            );
            Ok(params)
        }

        (Some(position), _) => {
            info!(
                symbol = %signal.symbol,
                position_size = position.size,
                "existing position with buy signal, adding"
            );
            let (total_value, available) =
                fetch_buy_inputs(exchange, quote_currency).await?;
            params.amount = size_add(
                &signal.symbol,
                signal.price,
                limits,
                total_value,
                position.value_at(signal.price),
                available,
                quote_currency,
            )?;
            Ok(params)
        }
    }
}

async fn fetch_buy_inputs(
    exchange: &dyn ExchangeClient,
    quote_currency: &str,
) -> Result<(f64, f64), SizingError> {
    let total_value = total_account_value(exchange).await?;
    let balance = exchange.get_balance(quote_currency).await?;
    Ok((total_value, balance.available))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SymbolLimits {
        SymbolLimits {
            min_amount: 0.001,
            amount_precision: 3,
            max_position_ratio: 20.0,
        }
    }

    #[test]
    fn test_round_truncates_toward_zero() {
        let limits = limits();
        assert_eq!(round_amount(0.0294, &limits), 0.029);
        assert_eq!(round_amount(0.0299999, &limits), 0.029);
        assert_eq!(round_amount(0.02, &limits), 0.02);
    }

    #[test]
    fn test_round_below_min_returns_zero() {
        let limits = limits();
        assert_eq!(round_amount(0.0008, &limits), 0.0);
        assert_eq!(round_amount(0.0, &limits), 0.0);
    }

    #[test]
    fn test_round_at_exact_min() {
        let limits = limits();
        assert_eq!(round_amount(0.001, &limits), 0.001);
    }

    #[test]
    fn test_rounded_amounts_are_precision_integral() {
        let limits = limits();
        for raw in [0.0294321, 1.23456789, 0.001999, 42.0001] {
            let rounded = round_amount(raw, &limits);
            let scaled = rounded * 10f64.powi(limits.amount_precision as i32);
            assert!(
                (scaled - scaled.round()).abs() < 1e-6,
                "rounded {rounded} not integral at precision"
            );
            assert!(rounded == 0.0 || rounded >= limits.min_amount);
        }
    }

    #[test]
    fn test_open_sizes_half_of_cap() {
        // 10000 total, 20% cap => 2000; half => 1000; at 50000 => 0.020.
        let amount =
            size_open("BTC_USDT", 50000.0, &limits(), 10000.0, 5000.0, "USDT").unwrap();
        assert_eq!(amount, 0.020);
    }

    #[test]
    fn test_open_respects_desired_funds_bound() {
        let limits = limits();
        let total_value = 10000.0;
        let price = 50000.0;
        let amount =
            size_open("BTC_USDT", price, &limits, total_value, 5000.0, "USDT").unwrap();
        let desired = total_value * limits.max_position_ratio / 100.0 * INITIAL_OPEN_RATIO;
        let slack = 10f64.powi(-(limits.amount_precision as i32));
        assert!(amount * price <= desired + slack);
    }

    #[test]
    fn test_open_with_zero_cap_exceeds_max_position() {
        let mut limits = limits();
        limits.max_position_ratio = 0.0;
        let result = size_open("BTC_USDT", 50000.0, &limits, 10000.0, 5000.0, "USDT");
        assert!(matches!(
            result,
            Err(SizingError::ExceedMaxPosition { .. })
        ));
    }

    #[test]
    fn test_open_with_short_balance_rejected() {
        // desired = 1000 but only 900 available.
        let result = size_open("BTC_USDT", 50000.0, &limits(), 10000.0, 900.0, "USDT");
        match result {
            Err(SizingError::InsufficientBalance {
                needed, available, ..
            }) => {
                assert_eq!(needed, 1000.0);
                assert_eq!(available, 900.0);
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }
    }

    #[test]
    fn test_open_dust_result_rejected() {
        // Cap of 2000, half = 1000, at a price so high the quantity rounds
        // to zero.
        let result = size_open("BTC_USDT", 10_000_000.0, &limits(), 10000.0, 5000.0, "USDT");
        assert!(matches!(result, Err(SizingError::AmountBelowMin { .. })));
    }

    #[test]
    fn test_add_uses_remaining_headroom() {
        // Position worth 500 against a 2000 cap: remaining 1500, ratio 0.75,
        // desired 1470, at 50000 => 0.029.
        let amount = size_add(
            "BTC_USDT",
            50000.0,
            &limits(),
            10000.0,
            500.0,
            5000.0,
            "USDT",
        )
        .unwrap();
        assert_eq!(amount, 0.029);
    }

    #[test]
    fn test_add_rejected_below_headroom_threshold() {
        // Position worth 1850 against a 2000 cap: remaining 150, ratio 0.075.
        let result = size_add(
            "BTC_USDT",
            50000.0,
            &limits(),
            10000.0,
            1850.0,
            5000.0,
            "USDT",
        );
        match result {
            Err(SizingError::InsufficientAddRatio { ratio, .. }) => {
                assert!((ratio - 0.075).abs() < 1e-9);
            }
            other => panic!("expected InsufficientAddRatio, got {other:?}"),
        }
    }

    #[test]
    fn test_add_rejected_when_cap_consumed() {
        let result = size_add(
            "BTC_USDT",
            50000.0,
            &limits(),
            10000.0,
            2100.0,
            5000.0,
            "USDT",
        );
        assert!(matches!(
            result,
            Err(SizingError::ExceedMaxPosition { .. })
        ));
    }

    #[test]
    fn test_close_half_above_threshold() {
        // Position 0.040 at 50000 = 2000 against a 2000 cap: ratio 1.0.
        let amount = size_close("BTC_USDT", 50000.0, 0.040, &limits(), Some(2000.0)).unwrap();
        assert_eq!(amount, 0.020);
    }

    #[test]
    fn test_close_full_at_threshold_boundary() {
        // Position ratio exactly 0.40 closes in full (threshold is
        // inclusive): 0.5 * 1600 = 800 against a 2000 cap.
        let amount = size_close("BTC_USDT", 1600.0, 0.5, &limits(), Some(2000.0)).unwrap();
        assert_eq!(amount, 0.5);
    }

    #[test]
    fn test_close_lifts_to_min_lot() {
        // Half of 0.0015 is 0.00075 < min 0.001, but the position covers the
        // minimum, so close exactly the minimum.
        let amount = size_close("BTC_USDT", 50000.0, 0.0015, &limits(), Some(10.0)).unwrap();
        assert_eq!(amount, 0.001);
    }

    #[test]
    fn test_close_at_exact_min_needs_no_adjustment() {
        // Half of 0.002 is exactly the minimum lot; the small cap keeps the
        // position ratio above the full-close threshold.
        let amount = size_close("BTC_USDT", 50000.0, 0.002, &limits(), Some(10.0)).unwrap();
        assert_eq!(amount, 0.001);
    }

    #[test]
    fn test_close_dust_position_rejected() {
        // 0.0008 held, below minimum lot entirely: full close rounds to zero.
        let result = size_close("BTC_USDT", 50000.0, 0.0008, &limits(), Some(2000.0));
        assert!(matches!(result, Err(SizingError::AmountBelowMin { .. })));
    }

    #[test]
    fn test_close_degraded_mode_closes_half() {
        // No valuation available: half close regardless of the cap ratio.
        let amount = size_close("BTC_USDT", 50000.0, 0.040, &limits(), None).unwrap();
        assert_eq!(amount, 0.020);
    }

    #[test]
    fn test_close_degraded_mode_skips_min_lot_lift() {
        // Half of 0.015 is 0.0075, under the 0.01 minimum. With valuation
        // available this would be lifted to the minimum lot; degraded mode
        // rounds the fixed-ratio close directly and rejects it.
        let mut limits = limits();
        limits.min_amount = 0.01;

        let result = size_close("BTC_USDT", 50000.0, 0.015, &limits, None);
        assert!(matches!(result, Err(SizingError::AmountBelowMin { .. })));

        let lifted = size_close("BTC_USDT", 50000.0, 0.015, &limits, Some(10.0)).unwrap();
        assert_eq!(lifted, 0.01);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SizingError::NoPositionToSell("BTC_USDT".into()).code(),
            "NO_POSITION_TO_SELL"
        );
        assert_eq!(
            SizingError::SymbolNotFound("BTC_USDT".into()).code(),
            "SYMBOL_NOT_FOUND"
        );
        assert_eq!(
            SizingError::ExceedMaxPosition {
                symbol: "BTC_USDT".into(),
                remaining: -1.0
            }
            .code(),
            "EXCEED_MAX_POSITION"
        );
    }
}
