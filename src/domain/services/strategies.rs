//! Strategy validators and their registry.
//!
//! Every inbound signal names a strategy by id; the registry maps that id to
//! a validator instance built from the persisted strategy definition. The
//! registry is rebuilt from storage at startup and after every admin write
//! to the strategy table, so activation changes take effect without a
//! restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::entities::signal::TradingSignal;
use crate::persistence::models::StrategyRecord;
use crate::persistence::repository::SignalRepository;

/// Registry key of the shipped trending validator.
pub const TRENDING_STRATEGY_ID: i64 = 1;

/// A strategy's signal admission rules.
#[async_trait]
pub trait StrategyValidator: Send + Sync {
    fn id(&self) -> i64;

    fn name(&self) -> &str;

    fn is_active(&self) -> bool;

    /// Check a signal against this strategy's rules; `Err` carries the
    /// rejection reason.
    async fn validate(&self, signal: &TradingSignal) -> Result<(), String>;
}

/// Trend-following admission rules.
///
/// Besides the basic field checks, the validator refuses two consecutive
/// signals in the same direction for a symbol: a trend strategy alternates
/// entries and exits, so a repeated direction means a duplicate or
/// out-of-order alert.
pub struct TrendingValidator {
    definition: StrategyRecord,
    signals: Arc<SignalRepository>,
}

impl TrendingValidator {
    pub fn new(definition: StrategyRecord, signals: Arc<SignalRepository>) -> Self {
        TrendingValidator {
            definition,
            signals,
        }
    }

    async fn check_last_signal_direction(&self, signal: &TradingSignal) -> Result<(), String> {
        let last = match self
            .signals
            .latest_by_symbol(&signal.symbol, signal.id)
            .await
        {
            Ok(last) => last,
            Err(e) => {
                // Fail open: a storage hiccup must not stall the intake.
                warn!(symbol = %signal.symbol, error = %e, "last-signal lookup failed");
                return Ok(());
            }
        };

        match last {
            Some(previous) if previous.action == signal.action => Err(format!(
                "consecutive signals in same direction not allowed: last was {}",
                previous.action
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StrategyValidator for TrendingValidator {
    fn id(&self) -> i64 {
        self.definition.id
    }

    fn name(&self) -> &str {
        &self.definition.name
    }

    fn is_active(&self) -> bool {
        self.definition.status
    }

    async fn validate(&self, signal: &TradingSignal) -> Result<(), String> {
        if signal.symbol.is_empty() {
            return Err("symbol must not be empty".to_string());
        }

        if signal.price <= 0.0 {
            return Err("price must be greater than 0".to_string());
        }

        if signal.action != "buy" && signal.action != "sell" {
            return Err("action must be buy or sell".to_string());
        }

        self.check_last_signal_direction(signal).await
    }
}

fn build_validator(
    definition: &StrategyRecord,
    signals: &Arc<SignalRepository>,
) -> Option<Arc<dyn StrategyValidator>> {
    match definition.id {
        TRENDING_STRATEGY_ID => Some(Arc::new(TrendingValidator::new(
            definition.clone(),
            Arc::clone(signals),
        ))),
        _ => None,
    }
}

/// Maps strategy ids to validator instances.
pub struct StrategyRegistry {
    validators: RwLock<HashMap<i64, Arc<dyn StrategyValidator>>>,
    signals: Arc<SignalRepository>,
}

impl StrategyRegistry {
    pub fn new(signals: Arc<SignalRepository>) -> Self {
        StrategyRegistry {
            validators: RwLock::new(HashMap::new()),
            signals,
        }
    }

    /// Replace the validator set from the given persisted definitions.
    /// Definitions without a matching implementation are skipped.
    pub async fn rebuild(&self, definitions: &[StrategyRecord]) {
        let mut validators: HashMap<i64, Arc<dyn StrategyValidator>> = HashMap::new();

        for definition in definitions {
            match build_validator(definition, &self.signals) {
                Some(validator) => {
                    validators.insert(definition.id, validator);
                }
                None => {
                    warn!(
                        id = definition.id,
                        name = %definition.name,
                        "no validator implementation for strategy, skipping"
                    );
                }
            }
        }

        let count = validators.len();
        *self.validators.write().await = validators;

        if count > 0 {
            info!(count, "strategy registry rebuilt");
        } else {
            warn!("strategy registry rebuilt with no usable strategies");
        }
    }

    pub async fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.validators.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Validate a signal through the strategy it names.
    pub async fn validate(&self, signal: &TradingSignal) -> Result<(), String> {
        let strategy_id: i64 = signal
            .strategy_id
            .parse()
            .map_err(|_| format!("invalid strategy id: {}", signal.strategy_id))?;

        let validator = {
            let validators = self.validators.read().await;
            validators.get(&strategy_id).cloned()
        };

        let Some(validator) = validator else {
            return Err("strategy not found".to_string());
        };

        if !validator.is_active() {
            return Err("strategy inactive".to_string());
        }

        validator.validate(signal).await
    }
}
