//! Spot position, derived on demand from balances.

use serde::{Deserialize, Serialize};

/// A held base-asset quantity for one symbol.
///
/// Spot positions have no entry price or leverage; the fields exist so the
/// shape stays uniform if a margin venue is ever added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Held base-asset quantity (`available + locked`).
    pub size: f64,
    pub entry_price: f64,
    pub leverage: u32,
    pub margin_type: String,
}

impl Position {
    pub fn spot(symbol: &str, size: f64) -> Self {
        Position {
            symbol: symbol.to_string(),
            size,
            entry_price: 0.0,
            leverage: 1,
            margin_type: "spot".to_string(),
        }
    }

    /// Position value in quote currency at the given price.
    pub fn value_at(&self, price: f64) -> f64 {
        self.size * price
    }
}
