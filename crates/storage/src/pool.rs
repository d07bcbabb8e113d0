use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Sqlite;
use tokio::sync::Mutex;
use tracing::{info, warn};

use common::{PoolSettings, Result};

/// Bounded set of reusable SQLite connections.
///
/// The pool is pre-warmed to `PoolSettings::capacity()` connections and never
/// grows past that. Connections run in WAL mode with `synchronous=NORMAL`;
/// the last few commits may be lost on power failure.
pub struct DbPool {
    pool: SqlitePool,
    settings: PoolSettings,
    schema_ready: Mutex<bool>,
}

impl DbPool {
    pub async fn connect(url: &str, settings: PoolSettings) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .pragma("cache_size", "-30000")
            .pragma("temp_store", "MEMORY");

        let capacity = settings.capacity();
        let pool = SqlitePoolOptions::new()
            .max_connections(capacity)
            .min_connections(capacity)
            .acquire_timeout(settings.acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        // Pre-warm.
        let mut warm = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            warm.push(pool.acquire().await?);
        }
        drop(warm);

        info!(
            capacity,
            timeout_secs = settings.acquire_timeout.as_secs_f64(),
            "Database pool ready"
        );

        Ok(Self {
            pool,
            settings,
            schema_ready: Mutex::new(false),
        })
    }

    /// Create tables and indexes. Callers are serialized; only the first call
    /// touches the database.
    pub async fn init_schema(&self) -> Result<()> {
        let mut ready = self.schema_ready.lock().await;
        if *ready {
            return Ok(());
        }
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        *ready = true;
        info!("Database schema ready");
        Ok(())
    }

    /// Borrow a connection, waiting up to the configured timeout.
    ///
    /// The connection goes back to the pool when dropped. Fails with
    /// `Error::PoolTimeout` when none frees up in time; callers treat that as a
    /// cycle-local failure.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(|e| {
            let err = common::Error::from(e);
            if matches!(err, common::Error::PoolTimeout) {
                warn!(
                    timeout_secs = self.settings.acquire_timeout.as_secs_f64(),
                    "No database connection available"
                );
            }
            err
        })
    }

    /// Total open connections (idle + in use).
    pub fn size(&self) -> u32 {
        self.pool.size()
    }

    pub fn idle(&self) -> usize {
        self.pool.num_idle()
    }

    pub fn capacity(&self) -> u32 {
        self.settings.capacity()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_pool;
    use common::Error;

    fn settings(warm: u32, max: u32, timeout_ms: u64) -> PoolSettings {
        PoolSettings {
            warm_connections: warm,
            max_connections: max,
            acquire_timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn pool_is_prewarmed_to_capacity() {
        let (_dir, pool) = temp_pool(settings(3, 50, 500)).await;
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.size(), 3);
    }

    #[tokio::test]
    async fn fourth_acquire_times_out_when_all_held() {
        let (_dir, pool) = temp_pool(settings(3, 3, 200)).await;

        let _a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        let _c = pool.acquire().await.unwrap();

        let started = std::time::Instant::now();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, Error::PoolTimeout), "got {err:?}");
        assert!(started.elapsed() >= Duration::from_millis(150));
        // The pool did not grow to satisfy the extra caller.
        assert_eq!(pool.size(), 3);
    }

    #[tokio::test]
    async fn blocked_acquire_succeeds_after_release() {
        let (_dir, pool) = temp_pool(settings(3, 3, 2_000)).await;

        let _a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(c);
        });

        let fourth = pool.acquire().await;
        assert!(fourth.is_ok(), "acquire should succeed once a connection is released");
        assert_eq!(pool.size(), 3);
    }

    #[tokio::test]
    async fn init_schema_is_idempotent_under_concurrency() {
        let (_dir, pool) = temp_pool(settings(3, 3, 2_000)).await;
        let pool = std::sync::Arc::new(pool);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move { pool.init_schema().await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn connections_use_wal_journal() {
        let (_dir, pool) = temp_pool(settings(1, 1, 2_000)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
