//! Order vocabulary: sizing output, position side, and the status set.

use serde::{Deserialize, Serialize};

/// Which way an order moves a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Opens or adds to a position.
    Open,
    /// Reduces a position toward zero.
    Close,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Open => write!(f, "open"),
            PositionSide::Close => write!(f, "close"),
        }
    }
}

/// Final parameters for a spot order, produced by the sizing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderParams {
    pub symbol: String,
    pub price: f64,
    pub action: String,
    pub order_type: String,
    pub position_side: PositionSide,
    pub amount: f64,
}

/// Order status vocabulary.
///
/// Statuses other than the ones named here pass through from the venue
/// verbatim (e.g. `open`, `pending`), so statuses are plain strings and this
/// module only pins down the ones the system itself assigns or reacts to.
pub mod status {
    pub const CREATED: &str = "created";
    pub const FILLED: &str = "filled";
    pub const CANCELED: &str = "canceled";
    pub const PARTIALLY_FILLED: &str = "partially_filled";
    pub const FAILED: &str = "failed";

    /// Terminal statuses are never demoted once recorded.
    pub fn is_terminal(status: &str) -> bool {
        matches!(status, FILLED | CANCELED | PARTIALLY_FILLED | FAILED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_side_display() {
        assert_eq!(PositionSide::Open.to_string(), "open");
        assert_eq!(PositionSide::Close.to_string(), "close");
    }

    #[test]
    fn test_position_side_serde() {
        assert_eq!(
            serde_json::to_string(&PositionSide::Close).unwrap(),
            "\"close\""
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(status::is_terminal(status::FILLED));
        assert!(status::is_terminal(status::CANCELED));
        assert!(status::is_terminal(status::PARTIALLY_FILLED));
        assert!(status::is_terminal(status::FAILED));
        assert!(!status::is_terminal(status::CREATED));
        assert!(!status::is_terminal("open"));
        assert!(!status::is_terminal("pending"));
    }
}
