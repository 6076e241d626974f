//! # Database Error Types
//!
//! ```text
//! sqlx::Error ──► DbError ──► SettlementError ──► ApiError { code, message }
//!                    │
//!                    └── StaleVersion surfaces as ConcurrentModification
//! ```
//!
//! Constraint failures are told apart by [`sqlx::error::ErrorKind`], not by
//! parsing SQLite's message text. The partial unique index on active
//! payouts and the `settled_sales` primary key both report
//! `UniqueViolation`; the payout repository turns those into
//! `StaleVersion` because they only fire when another writer got there
//! first.

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A unique index or primary key rejected the write.
    #[error("Unique constraint failed on {constraint}")]
    UniqueViolation { constraint: String },

    /// Sale, rule or adjustment for an unknown partner.
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// CHECK or NOT NULL constraint, i.e. a value the schema forbids.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Compare-and-swap on `payouts.version` found a newer row.
    ///
    /// ```text
    /// A: read v3 ──► UPDATE .. WHERE version = 3   ✓ v4
    /// B: read v3 ─────────► UPDATE .. WHERE version = 3   ✗ 0 rows
    /// ```
    #[error("{entity} {id} was modified concurrently")]
    StaleVersion { entity: String, id: String },

    /// A stored row no longer decodes into a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn stale_payout(id: impl Into<String>) -> Self {
        DbError::StaleVersion {
            entity: "Payout".to_string(),
            id: id.into(),
        }
    }

    pub fn corrupt(what: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        DbError::Corrupt(format!("{what}: {err}"))
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        // "UNIQUE constraint failed: settled_sales.sale_id"
                        constraint: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or(message.as_str())
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation(message),
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::ConstraintViolation(message)
                    }
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::RowNotFound => DbError::not_found("Row", "-"),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::Corrupt(format!("column {index}: {source}"))
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db_with_partner, PARTNER};

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DbError::stale_payout("po-1").to_string(),
            "Payout po-1 was modified concurrently"
        );
        assert_eq!(DbError::not_found("Sale", "s-1").to_string(), "Sale not found: s-1");
    }

    #[tokio::test]
    async fn test_constraint_kinds_are_classified() {
        let db = db_with_partner().await;
        let insert = "INSERT INTO partners (id, business_name, currency, payout_destination, created_at) \
                      VALUES (?1, 'x', ?2, 'd', '2026-01-01T00:00:00.000000Z')";

        let dup = sqlx::query(insert)
            .bind(PARTNER)
            .bind("EUR")
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(dup.is_unique_violation());
        assert_eq!(dup.to_string(), "Unique constraint failed on partners.id");

        let bad_currency = sqlx::query(insert)
            .bind("partner-2")
            .bind("EURO")
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(bad_currency, DbError::ConstraintViolation(_)));
    }
}
