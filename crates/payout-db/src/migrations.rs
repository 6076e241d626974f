//! # Schema Migrations
//!
//! SQL files under the workspace `migrations/sqlite/` directory are
//! embedded at compile time and applied in version order on startup.
//!
//! Existing files are never edited; a change is a new `NNN_description.sql`.
//! No migration may delete finalized or paid payouts or their line items.

use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Embedded versus applied migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
    /// Embedded versions not yet applied, ascending.
    pub pending: Vec<i64>,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }
}

pub(crate) async fn run(pool: &SqlitePool) -> DbResult<()> {
    let before = status(pool).await?;
    if before.is_current() {
        info!(applied = before.applied, "Schema up to date");
        return Ok(());
    }
    MIGRATOR.run(pool).await?;
    info!(versions = ?before.pending, "Schema migrated");
    Ok(())
}

pub(crate) async fn status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let has_table = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let applied: HashSet<i64> = if has_table {
        sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect()
    } else {
        HashSet::new()
    };

    let mut pending: Vec<i64> = MIGRATOR
        .iter()
        .map(|m| m.version)
        .filter(|v| !applied.contains(v))
        .collect();
    pending.sort_unstable();

    Ok(MigrationStatus {
        embedded: MIGRATOR.iter().count(),
        applied: applied.len(),
        pending,
    })
}
