// In crates/engine/src/refresher.rs

use crate::SimulatorService;
use quote_source::QuoteSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// A background task that periodically pulls fresh prices from a quote source
/// and applies them to the shared simulator.
pub struct QuoteRefresher {
    service: SimulatorService,
    source: Arc<dyn QuoteSource>,
    period: Duration,
}

impl QuoteRefresher {
    /// Starts refreshing now and then every `period` until the returned handle
    /// is shut down or dropped.
    pub fn spawn(service: SimulatorService, source: Arc<dyn QuoteSource>, period: Duration) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let refresher = Self { service, source, period };
        let join = tokio::spawn(refresher.run(cancel.clone()));
        RefreshHandle {
            cancel,
            join: Some(join),
        }
    }

    /// The main refresh loop.
    async fn run(self, cancel: CancellationToken) {
        tracing::info!(source = self.source.name(), period_secs = self.period.as_secs_f64(), "Starting quote refresher.");
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(source = self.source.name(), "Quote refresher stopped.");
                    break;
                }
                _ = ticker.tick() => {
                    // An in-flight fetch is abandoned on cancel; quotes are only written after it completes.
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!(source = self.source.name(), "Quote refresher stopped mid-fetch.");
                            break;
                        }
                        outcome = self.service.refresh_quotes(self.source.as_ref()) => {
                            // Failures are already reported by the service; keep the old quotes and wait.
                            if let Err(e) = outcome {
                                tracing::debug!(error = %e, "Skipping this refresh.");
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Owns a running refresher. Dropping it cancels the task.
pub struct RefreshHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|join| join.is_finished())
    }

    /// Cancels the refresher and waits for its loop to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "Quote refresher task failed.");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
