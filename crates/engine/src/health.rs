use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use common::{BotEvent, EventSink};

const LIVENESS_FACTOR: i64 = 5;

/// Point-in-time copy of the monitor state, for the operator API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub api_failures: BTreeMap<String, u32>,
    pub db_failures: u64,
    pub blacklisted: Vec<String>,
    pub last_successful_cycle: DateTime<Utc>,
    pub seconds_since_success: i64,
}

#[derive(Debug)]
struct Counters {
    failures: BTreeMap<String, u32>,
    blacklist: BTreeSet<String>,
    last_successful_cycle: DateTime<Utc>,
}

/// Per-instrument failure counting with a blacklist circuit breaker, plus a
/// liveness watchdog over the last successful cycle.
///
/// An instrument is blacklisted once its failure count exceeds `threshold`.
/// Counts only grow; an instrument stays out until an operator clears it.
#[derive(Debug)]
pub struct HealthMonitor {
    threshold: u32,
    counters: Mutex<Counters>,
    db_failures: AtomicU64,
    events: EventSink,
}

impl HealthMonitor {
    pub fn new(threshold: u32, events: EventSink) -> Self {
        Self {
            threshold,
            counters: Mutex::new(Counters {
                failures: BTreeMap::new(),
                blacklist: BTreeSet::new(),
                last_successful_cycle: Utc::now(),
            }),
            db_failures: AtomicU64::new(0),
            events,
        }
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Count one failure against `instrument`. Returns `true` if this failure
    /// pushed it onto the blacklist.
    pub fn record_fetch_failure(&self, instrument: &str) -> bool {
        let (count, newly) = {
            let mut c = self.counters();
            let count = c.failures.entry(instrument.to_string()).or_insert(0);
            *count += 1;
            let count = *count;
            let newly = count > self.threshold && c.blacklist.insert(instrument.to_string());
            (count, newly)
        };

        if newly {
            error!(instrument, failures = count, "Instrument blacklisted");
            self.events.emit(BotEvent::InstrumentBlacklisted {
                instrument: instrument.to_string(),
                failures: count,
            });
        } else {
            warn!(instrument, failures = count, threshold = self.threshold, "Instrument failure");
        }
        newly
    }

    /// Database contention is tracked globally and never blacklists an instrument.
    pub fn record_db_failure(&self) {
        let total = self.db_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(total, "Database failure");
    }

    pub fn db_failures(&self) -> u64 {
        self.db_failures.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self, instrument: &str) -> u32 {
        self.counters().failures.get(instrument).copied().unwrap_or(0)
    }

    pub fn is_blacklisted(&self, instrument: &str) -> bool {
        self.counters().blacklist.contains(instrument)
    }

    /// Operator rehabilitation: lift the blacklist and reset the counter.
    /// Returns `false` if the instrument was not blacklisted.
    pub fn clear_blacklist(&self, instrument: &str) -> bool {
        let removed = {
            let mut c = self.counters();
            c.failures.remove(instrument);
            c.blacklist.remove(instrument)
        };
        if removed {
            info!(instrument, "Instrument removed from blacklist");
        }
        removed
    }

    pub fn record_successful_cycle(&self) {
        self.record_successful_cycle_at(Utc::now());
    }

    pub fn record_successful_cycle_at(&self, at: DateTime<Utc>) {
        self.counters().last_successful_cycle = at;
    }

    pub fn last_successful_cycle(&self) -> DateTime<Utc> {
        self.counters().last_successful_cycle
    }

    /// Warn when no cycle has succeeded for more than five refresh intervals.
    /// Returns the elapsed seconds when the warning fired.
    pub fn check_liveness(&self, refresh_interval: Duration) -> Option<i64> {
        self.check_liveness_at(refresh_interval, Utc::now())
    }

    pub fn check_liveness_at(&self, refresh_interval: Duration, now: DateTime<Utc>) -> Option<i64> {
        let elapsed = (now - self.last_successful_cycle()).num_seconds();
        let limit = refresh_interval.as_secs() as i64 * LIVENESS_FACTOR;
        if elapsed <= limit {
            return None;
        }
        warn!(seconds_since_success = elapsed, limit, "Bot may be stuck");
        self.events.emit(BotEvent::LivenessWarning {
            seconds_since_success: elapsed,
        });
        Some(elapsed)
    }

    pub fn status(&self) -> HealthStatus {
        let c = self.counters();
        HealthStatus {
            api_failures: c.failures.clone(),
            db_failures: self.db_failures(),
            blacklisted: c.blacklist.iter().cloned().collect(),
            last_successful_cycle: c.last_successful_cycle,
            seconds_since_success: (Utc::now() - c.last_successful_cycle).num_seconds(),
        }
    }
}
