use std::time::Duration;

use crate::{Error, Interval, Result};

/// All configuration loaded from environment variables at startup.
/// A missing or malformed required variable is a fatal `Error::Config`.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub pool: PoolSettings,

    // Market data
    pub exchange: String,
    pub instruments: Vec<String>,
    pub candle_interval: Interval,
    pub candle_history_limit: usize,
    pub min_candles_for_trading: usize,

    // Cycle
    pub refresh_interval: Duration,
    pub max_concurrent_instruments: usize,

    // Freshness & circuit breaker
    pub freshness_check_enabled: bool,
    pub max_data_age: Duration,
    pub blacklist_failure_threshold: u32,

    // Trading
    pub auto_trading: bool,
    pub kill_switch_password: String,

    // Strategy config file path
    pub strategy_config_path: String,

    // Operator API
    pub dashboard_token: String,
    pub dashboard_port: u16,
}

/// Connection pool sizing. Capacity is `min(warm_connections, max_connections)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub warm_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            warm_connections: 3,
            max_connections: 50,
            acquire_timeout: Duration::from_secs(15),
        }
    }
}

impl PoolSettings {
    pub fn capacity(&self) -> u32 {
        self.warm_connections.min(self.max_connections).max(1)
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let instruments: Vec<String> = env
            .required("INSTRUMENTS")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if instruments.is_empty() {
            return Err(Error::Config("INSTRUMENTS must list at least one instrument".into()));
        }

        let candle_interval = env
            .optional("CANDLE_INTERVAL")
            .unwrap_or_else(|| "5m".to_string())
            .parse::<Interval>()?;

        let refresh_secs: u64 = env.parsed("REFRESH_INTERVAL_SECS", 15)?;
        if refresh_secs == 0 {
            return Err(Error::Config("REFRESH_INTERVAL_SECS must be positive".into()));
        }

        let max_concurrent_instruments: usize = env.parsed("MAX_CONCURRENT_INSTRUMENTS", 16)?;
        if max_concurrent_instruments == 0 {
            return Err(Error::Config("MAX_CONCURRENT_INSTRUMENTS must be positive".into()));
        }

        let pool = PoolSettings {
            warm_connections: env.parsed("DB_POOL_WARM_CONNECTIONS", 3)?,
            max_connections: env.parsed("DB_POOL_MAX_CONNECTIONS", 50)?,
            acquire_timeout: Duration::from_secs(env.parsed("DB_ACQUIRE_TIMEOUT_SECS", 15)?),
        };

        Ok(Config {
            database_url: env.required("DATABASE_URL")?,
            pool,
            exchange: env
                .optional("EXCHANGE")
                .unwrap_or_else(|| "simulated".to_string()),
            instruments,
            candle_interval,
            candle_history_limit: env.parsed("CANDLE_HISTORY_LIMIT", 500)?,
            min_candles_for_trading: env.parsed("MIN_CANDLES_FOR_TRADING", 200)?,
            refresh_interval: Duration::from_secs(refresh_secs),
            max_concurrent_instruments,
            freshness_check_enabled: env.flag("DATA_FRESHNESS_CHECK_ENABLED", true)?,
            max_data_age: Duration::from_secs(env.parsed("MAX_DATA_AGE_SECONDS", 300)?),
            blacklist_failure_threshold: env.parsed("BLACKLIST_FAILURE_THRESHOLD", 5)?,
            auto_trading: env.flag("AUTO_TRADING", false)?,
            kill_switch_password: env.required("KILL_SWITCH_PASSWORD")?,
            strategy_config_path: env
                .optional("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            dashboard_token: env.required("DASHBOARD_TOKEN")?,
            dashboard_port: env.parsed("DASHBOARD_PORT", 8080)?,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).ok_or_else(|| {
            Error::Config(format!(
                "required environment variable '{key}' is not set. Check your .env file."
            ))
        })
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key} has invalid value '{raw}'"))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.optional(key).map(|v| v.trim().to_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(Error::Config(format!("{key} must be a boolean, got '{v}'"))),
            },
        }
    }
}
