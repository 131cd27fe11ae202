//! Startup check over the per-symbol position caps.

use tracing::{error, info};

use crate::persistence::repository::ContractCodeRepository;
use crate::persistence::DatabaseError;

/// Outcome of the cap check over all active symbols.
#[derive(Debug, Clone)]
pub struct RatioSummary {
    pub total_ratio: f64,
    pub symbol_count: usize,
    pub within_budget: bool,
}

impl RatioSummary {
    pub fn remaining(&self) -> f64 {
        100.0 - self.total_ratio
    }
}

/// Sum `max_position_ratio` over active symbols and warn when the total
/// exceeds 100%. Startup proceeds either way; an over-allocated
/// configuration only means the later symbols cannot reach their cap.
pub async fn validate_position_ratios(
    contracts: &ContractCodeRepository,
) -> Result<RatioSummary, DatabaseError> {
    let active = contracts.list_active().await?;

    let total_ratio: f64 = active.iter().map(|c| c.max_position_ratio).sum();
    let summary = RatioSummary {
        total_ratio,
        symbol_count: active.len(),
        within_budget: total_ratio <= 100.0,
    };

    if summary.within_budget {
        info!(
            total_ratio = format!("{:.2}%", summary.total_ratio),
            remaining = format!("{:.2}%", summary.remaining()),
            symbol_count = summary.symbol_count,
            "position ratio check passed"
        );
    } else {
        error!(
            total_ratio = format!("{:.2}%", summary.total_ratio),
            symbol_count = summary.symbol_count,
            "active symbols allocate more than 100% of account value"
        );
    }

    Ok(summary)
}
