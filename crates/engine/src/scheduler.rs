use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::engine::{InstrumentOutcome, TradingEngine};

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub processed: usize,
    pub skipped_blacklisted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub trades_opened: usize,
}

/// Fixed-interval control loop. Each tick fans out one task per
/// non-blacklisted instrument and waits for all of them before sleeping,
/// so ticks never overlap.
pub struct CycleScheduler {
    engine: Arc<TradingEngine>,
    instruments: Vec<String>,
    refresh_interval: Duration,
    max_concurrency: usize,
}

impl CycleScheduler {
    pub fn new(
        engine: Arc<TradingEngine>,
        instruments: Vec<String>,
        refresh_interval: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            engine,
            instruments,
            refresh_interval,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let health = self.engine.health();
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();

        for instrument in &self.instruments {
            if health.is_blacklisted(instrument) {
                debug!(instrument = %instrument, "Skipping blacklisted instrument");
                report.skipped_blacklisted += 1;
                continue;
            }
            let engine = self.engine.clone();
            let semaphore = semaphore.clone();
            let name = instrument.clone();
            let handle = tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                engine.run_instrument(&name).await
            });
            names.insert(handle.id(), instrument.clone());
            report.processed += 1;
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    let instrument = names.remove(&id).unwrap_or_default();
                    debug!(instrument = %instrument, ?outcome, "Instrument done");
                    if outcome.is_success() {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                    }
                    if matches!(outcome, InstrumentOutcome::TradeOpened { .. }) {
                        report.trades_opened += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    match names.remove(&e.id()) {
                        Some(instrument) => {
                            error!(instrument = %instrument, error = %e, "Instrument task panicked");
                            health.record_fetch_failure(&instrument);
                        }
                        None => error!(error = %e, "Instrument task panicked"),
                    }
                }
            }
        }

        if report.succeeded > 0 {
            health.record_successful_cycle();
        }
        health.check_liveness(self.refresh_interval);
        report
    }

    /// Tick until `shutdown` flips to `true` (or its sender is dropped). The
    /// current tick always drains before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            instruments = ?self.instruments,
            refresh_secs = self.refresh_interval.as_secs(),
            max_concurrency = self.max_concurrency,
            "Cycle scheduler started"
        );

        let mut cycle = 0u64;
        loop {
            if *shutdown.borrow() {
                break;
            }
            cycle += 1;
            let report = self.run_cycle(cycle).await;
            info!(
                cycle = report.cycle,
                processed = report.processed,
                skipped = report.skipped_blacklisted,
                ok = report.succeeded,
                failed = report.failed,
                trades = report.trades_opened,
                "Cycle complete"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.refresh_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(cycles = cycle, "Cycle scheduler stopped");
    }
}
