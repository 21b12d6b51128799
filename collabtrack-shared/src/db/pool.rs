/// Database connection pool
///
/// CollabTrack keeps every document (users, projects, tasks, teams) in
/// PostgreSQL. Live board and project streams re-query on every change, so
/// the pool size bounds how many snapshots are built at once.
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let pool = create_pool(DatabaseConfig::with_url("postgresql://collabtrack@localhost/collabtrack")).await?;
///
/// let projects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
///     .fetch_one(&pool)
///     .await?;
/// println!("{} projects", projects);
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::{str::FromStr, time::Duration};

/// Reported to Postgres as `application_name`
pub const APPLICATION_NAME: &str = "collabtrack";

/// Configuration for the database connection pool
///
/// Timeouts are in seconds so they can be read straight from environment
/// variables.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    pub max_connections: u32,

    /// Minimum number of idle connections kept warm
    pub min_connections: u32,

    /// Timeout for acquiring a connection from the pool (seconds)
    pub connect_timeout_seconds: u64,

    /// Idle time before a connection is closed (seconds, None = never)
    pub idle_timeout_seconds: Option<u64>,

    /// Maximum lifetime of a connection before recycling (seconds, None = forever)
    pub max_lifetime_seconds: Option<u64>,

    /// Ping connections before handing them out
    pub test_before_acquire: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
            test_before_acquire: true,
        }
    }
}

impl DatabaseConfig {
    /// Default configuration pointing at `url`
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Pool options without the connection target
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(Duration::from_secs(self.connect_timeout_seconds))
            .idle_timeout(self.idle_timeout_seconds.map(Duration::from_secs))
            .max_lifetime(self.max_lifetime_seconds.map(Duration::from_secs))
            .test_before_acquire(self.test_before_acquire)
    }

    fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        Ok(PgConnectOptions::from_str(&self.url)?.application_name(APPLICATION_NAME))
    }
}

/// Connects and runs one health check before handing the pool out
///
/// # Errors
///
/// Fails on a malformed URL, an unreachable server, or a failed `SELECT 1`.
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_seconds = config.connect_timeout_seconds,
        "Connecting to PostgreSQL"
    );

    let pool = config
        .pool_options()
        .connect_with(config.connect_options()?)
        .await?;

    health_check(&pool).await?;

    tracing::info!(connections = pool.size(), "Database pool ready");
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    let answer: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    match answer {
        1 => Ok(()),
        other => {
            tracing::warn!(answer = other, "SELECT 1 answered something else");
            Err(sqlx::Error::Protocol(format!(
                "health check answered {}",
                other
            )))
        }
    }
}

/// Pool usage, reported by `GET /health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Checked out by a handler or stream
    pub active_connections: usize,

    pub idle_connections: usize,

    pub total_connections: usize,
}

impl From<&PgPool> for PoolStats {
    fn from(pool: &PgPool) -> Self {
        let total = pool.size() as usize;
        let idle = pool.num_idle();

        Self {
            active_connections: total.saturating_sub(idle),
            idle_connections: idle,
            total_connections: total,
        }
    }
}

pub fn get_pool_stats(pool: &PgPool) -> PoolStats {
    PoolStats::from(pool)
}

/// Waits for checked-out connections to return, then closes them all
pub async fn close_pool(pool: PgPool) {
    let stats = get_pool_stats(&pool);
    tracing::info!(active = stats.active_connections, "Closing database pool");
    pool.close().await;
}
