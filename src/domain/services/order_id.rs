//! System order id generation.
//!
//! An id is a type code, two-digit year, month, day, two random digits, a
//! partition letter, and a 3-digit sequence, e.g. `C25051642A001`. The
//! sequence is monotonic per day and partition; when it passes 999 the
//! partition letter advances and the sequence restarts at 1. A day can
//! therefore hold 26 × 999 ids before generation fails.

use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

pub const ORDER_ID_LENGTH: usize = 13;

const INITIAL_PARTITION: char = 'A';
const MAX_SEQUENCE: u32 = 999;

/// Type code prefix for generated ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Crypto,
    Other,
}

impl OrderKind {
    fn code(self) -> char {
        match self {
            OrderKind::Crypto => 'C',
            OrderKind::Other => 'O',
        }
    }
}

#[derive(Debug, Error)]
pub enum OrderIdError {
    #[error("daily order ceiling exceeded")]
    DailyCeilingExceeded,
}

#[derive(Default)]
struct GeneratorState {
    /// `YYMMDD_P` -> last issued sequence.
    sequences: HashMap<String, u32>,
    /// `YYMMDD` -> current partition letter.
    partitions: HashMap<String, char>,
}

/// Thread-safe generator of daily-partitioned system order ids.
pub struct OrderIdGenerator {
    state: Mutex<GeneratorState>,
}

impl Default for OrderIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        OrderIdGenerator {
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Generate the next id for today.
    pub fn generate(&self, kind: OrderKind) -> Result<String, OrderIdError> {
        let now = Utc::now();
        let date_key = now.format("%y%m%d").to_string();

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut partition = *state
            .partitions
            .entry(date_key.clone())
            .or_insert(INITIAL_PARTITION);

        let mut partition_key = format!("{date_key}_{partition}");
        let mut sequence = state.sequences.get(&partition_key).copied().unwrap_or(0) + 1;

        if sequence > MAX_SEQUENCE {
            partition = ((partition as u8) + 1) as char;
            if partition > 'Z' {
                return Err(OrderIdError::DailyCeilingExceeded);
            }
            state.partitions.insert(date_key.clone(), partition);
            partition_key = format!("{date_key}_{partition}");
            sequence = 1;
        }

        state.sequences.insert(partition_key, sequence);

        let random_part: u32 = rand::thread_rng().gen_range(0..100);
        Ok(format!(
            "{}{}{:02}{}{:03}",
            kind.code(),
            date_key,
            random_part,
            partition,
            sequence
        ))
    }

    /// Drop sequence and partition entries whose date is not today.
    pub fn cleanup_expired(&self) {
        let today = Utc::now().format("%y%m%d").to_string();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        state
            .sequences
            .retain(|key, _| key.split('_').next() == Some(today.as_str()));
        state.partitions.retain(|date, _| *date == today);
    }

    #[cfg(test)]
    fn seed(&self, date_key: &str, partition: char, sequence: u32) {
        let mut state = self.state.lock().unwrap();
        state.partitions.insert(date_key.to_string(), partition);
        state
            .sequences
            .insert(format!("{date_key}_{partition}"), sequence);
    }
}
