use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::{config::DatabaseConfig, error::StoreError};

/// Postgres-backed credential and task store.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
    query_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs one store operation, failing with `Unavailable` past the query timeout.
    pub(crate) async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(res) => res.map_err(StoreError::from),
            Err(_) => {
                warn!(op, timeout_ms = self.query_timeout.as_millis() as u64, "query timed out");
                Err(StoreError::Unavailable(format!("{op} timed out")))
            }
        }
    }
}

/// Delay before the attempt following `attempt` (1-based).
pub fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(1000 * 2u64.pow(attempt.saturating_sub(1).min(16)))
}

/// Connects the pool, retrying with exponential backoff.
///
/// Attempt `n` waits at most `connect_timeout * n`. Only the initial connect is
/// retried; steady-state queries surface their errors directly.
pub async fn connect_with_retry(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let url = cfg
        .url
        .as_deref()
        .context("DATABASE_URL is required for the postgres store")?;

    let mut last_err = None;
    for attempt in 1..=cfg.connect_attempts {
        let timeout = cfg.connect_timeout * attempt;
        info!(attempt, max = cfg.connect_attempts, "connecting to database");

        let connect = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(cfg.query_timeout)
            .connect(url);

        match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(pool)) => {
                info!(attempt, "database connected");
                return Ok(pool);
            }
            Ok(Err(e)) => {
                warn!(attempt, error = %e, "database connect failed");
                last_err = Some(anyhow::Error::new(e));
            }
            Err(_) => {
                warn!(attempt, timeout_ms = timeout.as_millis() as u64, "database connect timed out");
                last_err = Some(anyhow::anyhow!("connection timeout ({}ms)", timeout.as_millis()));
            }
        }

        if attempt < cfg.connect_attempts {
            let wait = backoff_for(attempt);
            info!(wait_ms = wait.as_millis() as u64, "waiting before next attempt");
            tokio::time::sleep(wait).await;
        }
    }

    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("no connection attempts made"))
        .context("unable to connect to database after multiple attempts"))
}
