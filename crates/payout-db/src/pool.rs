//! # Connection Pool
//!
//! ```text
//! DbConfig::new(path) / DbConfig::in_memory()
//!        │
//!        ▼  connect_options()   WAL, foreign keys, busy timeout
//! Database::new(config) ──► SqlitePool ──► migrations (if enabled)
//!        │
//!        ├── partners()     PartnerRepository
//!        ├── rules()        RuleRepository
//!        ├── sales()        SaleRepository
//!        ├── adjustments()  AdjustmentRepository
//!        └── payouts()      PayoutRepository
//! ```
//!
//! Batch runs compute several partners at once. Each draft is one short
//! write transaction, so concurrent writers wait on the busy timeout
//! instead of failing with `SQLITE_BUSY`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations::{self, MigrationStatus};
use crate::repository::adjustment::AdjustmentRepository;
use crate::repository::partner::PartnerRepository;
use crate::repository::payout::PayoutRepository;
use crate::repository::rule::RuleRepository;
use crate::repository::sale::SaleRepository;

const MEMORY: &str = ":memory:";

/// Where the store lives and how the pool behaves.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    /// How long a writer waits for another writer's lock.
    pub busy_timeout: Duration,
    pub acquire_timeout: Duration,
    pub migrate: bool,
}

impl DbConfig {
    /// File-backed store, created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
            migrate: true,
        }
    }

    /// Private in-memory store for tests.
    ///
    /// The database lives in its only connection, so repositories never
    /// touch the pool while one of their transactions is open.
    pub fn in_memory() -> Self {
        DbConfig {
            path: PathBuf::from(MEMORY),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn run_migrations(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    fn is_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        Ok(options.foreign_keys(true).busy_timeout(self.busy_timeout))
    }
}

/// Handle to the payout store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), max_connections = config.max_connections, "Opening payout store");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            // An idle in-memory connection must never be reaped
            .idle_timeout(if config.is_memory() { None } else { Some(Duration::from_secs(600)) })
            .max_lifetime(if config.is_memory() { None } else { Some(Duration::from_secs(1800)) })
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        } else {
            debug!("Migrations disabled");
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run(&self.pool).await
    }

    pub async fn migration_status(&self) -> DbResult<MigrationStatus> {
        migrations::status(&self.pool).await
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn partners(&self) -> PartnerRepository {
        PartnerRepository::new(self.pool.clone())
    }

    pub fn rules(&self) -> RuleRepository {
        RuleRepository::new(self.pool.clone())
    }

    /// The booking ledger.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub fn adjustments(&self) -> AdjustmentRepository {
        AdjustmentRepository::new(self.pool.clone())
    }

    pub fn payouts(&self) -> PayoutRepository {
        PayoutRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing payout store");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
