use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, error};

use common::{Candle, CandleSeries, Interval, Result};

use crate::DbPool;

/// Result of a best-effort cache write.
///
/// Cache writes never fail the caller: a failed write is logged and reported
/// here so callers and tests can see which path was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(usize),
    Skipped,
    Failed,
}

#[derive(sqlx::FromRow)]
struct CandleRow {
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CandleRow {
    fn into_candle(self) -> Option<Candle> {
        Some(Candle {
            open_time: Utc.timestamp_millis_opt(self.open_time).single()?,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

/// Time-series cache over the `candles` table.
#[derive(Clone)]
pub struct CandleStore {
    pool: Arc<DbPool>,
}

impl CandleStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Replace-on-conflict bulk write. No-op on an empty series; any failure
    /// is logged and swallowed.
    pub async fn upsert(
        &self,
        series: &CandleSeries,
        instrument: &str,
        interval: Interval,
    ) -> WriteOutcome {
        if series.is_empty() {
            return WriteOutcome::Skipped;
        }
        match self.try_upsert(series, instrument, interval).await {
            Ok(n) => {
                debug!(instrument, %interval, rows = n, "Cached candles");
                WriteOutcome::Written(n)
            }
            Err(e) => {
                error!(instrument, %interval, error = %e, "Failed to cache candles, continuing");
                WriteOutcome::Failed
            }
        }
    }

    async fn try_upsert(
        &self,
        series: &CandleSeries,
        instrument: &str,
        interval: Interval,
    ) -> Result<usize> {
        let interval = interval.to_string();
        let mut conn = self.pool.acquire().await?;
        let mut tx = sqlx::Connection::begin(&mut *conn).await?;

        for candle in series.candles() {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO candles
                    (instrument, interval, open_time, open, high, low, close, volume)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(instrument)
            .bind(&interval)
            .bind(candle.open_time.timestamp_millis())
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(series.len())
    }

    /// Newest `limit` candles, returned oldest first.
    pub async fn query(
        &self,
        instrument: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<CandleRow> = sqlx::query_as(
            r#"
            SELECT open_time, open, high, low, close, volume
            FROM candles
            WHERE instrument = ?1 AND interval = ?2
            ORDER BY open_time DESC
            LIMIT ?3
            "#,
        )
        .bind(instrument)
        .bind(interval.to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *conn)
        .await?;

        Ok(CandleSeries::new(
            rows.into_iter().filter_map(CandleRow::into_candle).collect(),
        ))
    }

    /// Open time of the newest cached candle for `(instrument, interval)`.
    pub async fn latest_timestamp(
        &self,
        instrument: &str,
        interval: Interval,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.pool.acquire().await?;
        let latest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(open_time) FROM candles WHERE instrument = ?1 AND interval = ?2",
        )
        .bind(instrument)
        .bind(interval.to_string())
        .fetch_one(&mut *conn)
        .await?;
        Ok(latest.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }

    /// Open time of the newest cached candle for an instrument across all intervals.
    pub async fn latest_timestamp_any(&self, instrument: &str) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.pool.acquire().await?;
        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(open_time) FROM candles WHERE instrument = ?1")
                .bind(instrument)
                .fetch_one(&mut *conn)
                .await?;
        Ok(latest.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }

    /// Delete every cached row for an instrument. Returns the number of rows removed.
    pub async fn purge(&self, instrument: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("DELETE FROM candles WHERE instrument = ?1")
            .bind(instrument)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
