use std::time::Duration;

use chrono::{DateTime, Utc};

use common::{CandleSeries, FreshnessReport};

/// Decides whether a series is recent enough to trade on.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    pub enabled: bool,
    pub max_age: Duration,
}

impl FreshnessPolicy {
    pub fn new(enabled: bool, max_age: Duration) -> Self {
        Self { enabled, max_age }
    }

    pub fn check(&self, series: &CandleSeries) -> FreshnessReport {
        self.check_at(series, Utc::now())
    }

    /// Age is measured from the newest candle's open time to `now`.
    /// Exactly `max_age` old still counts as fresh.
    pub fn check_at(&self, series: &CandleSeries, now: DateTime<Utc>) -> FreshnessReport {
        let Some(latest) = series.latest() else {
            return FreshnessReport {
                is_fresh: !self.enabled,
                age_seconds: 0,
                message: "No data available".into(),
            };
        };
        let age_seconds = (now - latest.open_time).num_seconds();

        if !self.enabled {
            return FreshnessReport {
                is_fresh: true,
                age_seconds,
                message: "Freshness check disabled".into(),
            };
        }

        let max = self.max_age.as_secs() as i64;
        if age_seconds <= max {
            FreshnessReport {
                is_fresh: true,
                age_seconds,
                message: format!("Data is fresh ({age_seconds}s old)"),
            }
        } else {
            FreshnessReport {
                is_fresh: false,
                age_seconds,
                message: format!("Data is stale: {age_seconds}s old (max {max}s)"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::Candle;

    fn ending_at(t: DateTime<Utc>) -> CandleSeries {
        CandleSeries::new(
            (0..3)
                .map(|i| Candle {
                    open_time: t - chrono::Duration::minutes(5 * (2 - i)),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
                })
                .collect(),
        )
    }

    fn policy() -> FreshnessPolicy {
        FreshnessPolicy::new(true, Duration::from_secs(300))
    }

    #[test]
    fn stale_past_max_age() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let report = policy().check_at(&ending_at(t), t + chrono::Duration::seconds(301));
        assert!(!report.is_fresh);
        assert_eq!(report.age_seconds, 301);
    }

    #[test]
    fn fresh_within_max_age() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let report = policy().check_at(&ending_at(t), t + chrono::Duration::seconds(100));
        assert!(report.is_fresh);
        assert_eq!(report.age_seconds, 100);

        let edge = policy().check_at(&ending_at(t), t + chrono::Duration::seconds(300));
        assert!(edge.is_fresh);
    }

    #[test]
    fn empty_series_is_never_fresh_when_enabled() {
        let report = policy().check(&CandleSeries::default());
        assert!(!report.is_fresh);
        assert_eq!(report.message, "No data available");
    }

    #[test]
    fn disabled_policy_passes_old_data() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let report = FreshnessPolicy::new(false, Duration::from_secs(1)).check(&ending_at(t));
        assert!(report.is_fresh);
        assert!(report.age_seconds > 0);
    }
}
