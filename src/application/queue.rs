//! Signal queues.
//!
//! Two bounded FIFO buffers decouple the webhook from the work it triggers:
//! `processQ` feeds the execution path and `storeQ` feeds persistence. Each
//! queue is drained by a single task, so items are handled strictly in
//! admission order.
//!
//! A signal reaches `storeQ` only after the execution path has finished with
//! it, success or failure, so every admitted signal gets exactly one
//! persistence attempt carrying its final observed effect.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::engine::TradingEngine;
use crate::domain::entities::signal::TradingSignal;
use crate::persistence::repository::SignalRepository;

pub const QUEUE_CAPACITY: usize = 1000;

/// How long the webhook may wait for queue space before giving up.
pub const ADMIT_WAIT: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum AdmitError {
    #[error("processing queue full")]
    QueueFull,
}

/// Sending half of both queues, shared by the webhook and the process drain.
#[derive(Clone)]
pub struct SignalQueues {
    process_tx: mpsc::Sender<TradingSignal>,
    store_tx: mpsc::Sender<TradingSignal>,
}

/// Receiving half, consumed once by the two drain tasks.
pub struct SignalQueueReceivers {
    pub process_rx: mpsc::Receiver<TradingSignal>,
    pub store_rx: mpsc::Receiver<TradingSignal>,
}

pub fn signal_queues() -> (SignalQueues, SignalQueueReceivers) {
    let (process_tx, process_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (store_tx, store_rx) = mpsc::channel(QUEUE_CAPACITY);
    (
        SignalQueues {
            process_tx,
            store_tx,
        },
        SignalQueueReceivers {
            process_rx,
            store_rx,
        },
    )
}

impl SignalQueues {
    /// Admit a signal to the processing queue, waiting at most
    /// [`ADMIT_WAIT`] for space.
    pub async fn admit(&self, signal: TradingSignal) -> Result<(), AdmitError> {
        self.process_tx
            .send_timeout(signal, ADMIT_WAIT)
            .await
            .map_err(|_| AdmitError::QueueFull)
    }

    /// Hand a signal to the storage queue without blocking. A full queue
    /// drops the signal with a warning; processing is never held up by
    /// storage backpressure.
    pub fn submit_store(&self, signal: TradingSignal) {
        match self.store_tx.try_send(signal) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(signal)) => {
                warn!(
                    symbol = %signal.symbol,
                    strategy_id = %signal.strategy_id,
                    "storage queue full, dropping signal"
                );
            }
            Err(mpsc::error::TrySendError::Closed(signal)) => {
                warn!(symbol = %signal.symbol, "storage queue closed, dropping signal");
            }
        }
    }
}

/// Drain the processing queue: run each signal through the engine, then
/// hand it to the storage queue regardless of outcome.
pub fn spawn_process_drain(
    mut process_rx: mpsc::Receiver<TradingSignal>,
    engine: Arc<TradingEngine>,
    queues: SignalQueues,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = process_rx.recv().await {
            if let Err(e) = engine.process_signal(&signal).await {
                warn!(
                    symbol = %signal.symbol,
                    action = %signal.action,
                    error = %e,
                    "signal processing failed"
                );
            }
            queues.submit_store(signal);
        }
        info!("processing drain stopped");
    })
}

/// Drain the storage queue: one insert per signal, failures logged, no
/// redelivery.
pub fn spawn_store_drain(
    mut store_rx: mpsc::Receiver<TradingSignal>,
    signals: Arc<SignalRepository>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = store_rx.recv().await {
            match signals.insert(&signal).await {
                Ok(id) => {
                    debug!(id, symbol = %signal.symbol, action = %signal.action, "signal stored");
                }
                Err(e) => {
                    error!(
                        symbol = %signal.symbol,
                        action = %signal.action,
                        error = %e,
                        "failed to store signal"
                    );
                }
            }
        }
        info!("storage drain stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::ContractType;
    use crate::persistence::init_database;
    use chrono::Utc;

    fn signal(symbol: &str) -> TradingSignal {
        TradingSignal {
            id: None,
            secret_key: None,
            symbol: symbol.to_string(),
            scode: "BTC".to_string(),
            contract_type: ContractType::Crypto,
            price: 50000.0,
            action: "buy".to_string(),
            alert_title: "breakout".to_string(),
            time_circle: "1h".to_string(),
            strategy_id: "1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_admit_when_space_available() {
        let (queues, mut receivers) = signal_queues();
        queues.admit(signal("BTC_USDT")).await.unwrap();

        let received = receivers.process_rx.recv().await.unwrap();
        assert_eq!(received.symbol, "BTC_USDT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_times_out_when_full() {
        let (queues, _receivers) = signal_queues();

        // Fill the queue to capacity with no drain running.
        for _ in 0..QUEUE_CAPACITY {
            queues.admit(signal("BTC_USDT")).await.unwrap();
        }

        let result = queues.admit(signal("BTC_USDT")).await;
        assert!(matches!(result, Err(AdmitError::QueueFull)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_succeeds_if_drained_within_wait() {
        let (queues, mut receivers) = signal_queues();
        for _ in 0..QUEUE_CAPACITY {
            queues.admit(signal("BTC_USDT")).await.unwrap();
        }

        // A concurrent consumer frees one slot inside the admission window.
        let consumer = tokio::spawn(async move {
            receivers.process_rx.recv().await;
            receivers
        });

        queues.admit(signal("ETH_USDT")).await.unwrap();
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_store_submission_drops_when_full() {
        let (queues, receivers) = signal_queues();
        for _ in 0..QUEUE_CAPACITY {
            queues.submit_store(signal("BTC_USDT"));
        }
        // Does not block and does not panic.
        queues.submit_store(signal("DROPPED"));
        drop(receivers);
    }

    #[tokio::test]
    async fn test_store_drain_persists_in_order() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();
        let signals = Arc::new(SignalRepository::new(pool));
        let (queues, receivers) = signal_queues();

        let drain = spawn_store_drain(receivers.store_rx, Arc::clone(&signals));

        queues.submit_store(signal("BTC_USDT"));
        queues.submit_store(signal("ETH_USDT"));
        drop(queues);
        drain.await.unwrap();

        assert_eq!(signals.count().await.unwrap(), 2);
        let latest = signals.latest_by_symbol("ETH_USDT", None).await.unwrap();
        assert!(latest.is_some());
    }
}
