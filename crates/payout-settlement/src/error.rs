//! # Settlement Error Types
//!
//! Error types for settlement orchestration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Settlement Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Domain      │  │    Database     │  │      Transfer           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(...)      │  │  Db(...)        │  │  Transfer(Declined)     │ │
//! │  │  lifecycle,     │  │  StaleVersion ──┼──┼► Core(Concurrent-       │ │
//! │  │  validation,    │  │  mapped up      │  │       Modification)     │ │
//! │  │  money          │  │                 │  │  TransferExhausted      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Lookups       │  │  Configuration  │                              │
//! │  │                 │  │                 │                              │
//! │  │  NotFound       │  │  Config         │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use payout_core::CoreError;
use payout_db::DbError;
use thiserror::Error;

use crate::ports::TransferError;

/// Result type alias for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

/// Settlement error type covering every failure surfaced to callers.
#[derive(Debug, Error)]
pub enum SettlementError {
    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A settlement rule or lifecycle transition was violated.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Store failure that has no domain meaning.
    #[error("Database error: {0}")]
    Db(DbError),

    /// The transfer provider rejected the transfer outright.
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// The transfer provider stayed unreachable for every attempt.
    #[error("Transfer for payout {payout_id} not initiated after {attempts} attempts: {last_error}")]
    TransferExhausted {
        payout_id: String,
        attempts: u32,
        last_error: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SettlementError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        SettlementError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns true if the failed operation may succeed when retried.
    ///
    /// Lifecycle errors are never retryable; they indicate an ordering
    /// mistake by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            SettlementError::Transfer(e) => e.is_retryable(),
            SettlementError::TransferExhausted { .. } => true,
            SettlementError::Db(e) => {
                matches!(e, DbError::ConnectionFailed(_) | DbError::PoolExhausted)
            }
            SettlementError::Core(CoreError::ConcurrentModification { .. }) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SettlementError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::StaleVersion { entity, id } => {
                SettlementError::Core(CoreError::ConcurrentModification { entity, id })
            }
            DbError::NotFound { entity, id } => SettlementError::NotFound { entity, id },
            other => SettlementError::Db(other),
        }
    }
}

impl From<std::io::Error> for SettlementError {
    fn from(err: std::io::Error) -> Self {
        SettlementError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SettlementError {
    fn from(err: toml::de::Error) -> Self {
        SettlementError::Config(err.to_string())
    }
}
