use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network or API failure while fetching market data. Counts toward the
    /// instrument's blacklist threshold.
    #[error("Fetch failed for {instrument}: {reason}")]
    TransientFetch { instrument: String, reason: String },

    /// No pooled database connection became available within the acquire timeout.
    #[error("Timed out waiting for a database connection")]
    PoolTimeout,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy file error: {0}")]
    StrategyFile(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => Error::PoolTimeout,
            other => Error::Database(other),
        }
    }
}

impl Error {
    pub fn fetch(instrument: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::TransientFetch {
            instrument: instrument.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
