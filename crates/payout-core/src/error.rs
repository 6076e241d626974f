//! # Error Types
//!
//! Domain-specific error types for payout-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  payout-core errors (this file)                                        │
//! │  ├── CoreError        - Settlement domain errors                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  payout-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  payout-settlement errors (separate crate)                             │
//! │  └── SettlementError  - Orchestration + collaborator failures          │
//! │                                                                         │
//! │  payout-api errors (in app)                                            │
//! │  └── ApiError         - What HTTP callers see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SettlementError → ApiError        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (payout id, partner id, status)
//! 3. Errors are enum variants, never String
//! 4. Pure computation errors are returned, never clamped or defaulted

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::lifecycle::PayoutStatus;
use crate::money::Currency;

// =============================================================================
// Core Error
// =============================================================================

/// Settlement domain errors.
///
/// Lifecycle errors (`InvalidTransition`, `Immutable`, `ReferenceConflict`,
/// `EmptyPayout`) indicate an ordering mistake by the caller and are never
/// retried automatically.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two amounts in different currencies were combined.
    ///
    /// Should never happen with one currency per partner, but guarded.
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    /// Integer overflow in minor-unit arithmetic.
    #[error("Amount overflow during money arithmetic")]
    AmountOverflow,

    /// A non-cancelled payout already covers part of the requested period.
    ///
    /// ## User Workflow
    /// ```text
    /// computeDraft(partner-1, [2026-09-01, 2026-10-01))
    ///      │
    ///      ▼
    /// Existing payout [2026-09-15, 2026-10-15) status=draft
    ///      │
    ///      ▼
    /// PeriodOverlap { existing_payout_id }
    /// ```
    #[error("Period overlaps payout {existing_payout_id} for partner {partner_id}")]
    PeriodOverlap {
        partner_id: String,
        existing_payout_id: String,
    },

    /// Finalize called on a payout without line items.
    #[error("Payout {payout_id} has no line items and cannot be finalized")]
    EmptyPayout { payout_id: String },

    /// The requested status change is not in the transition table.
    #[error("Payout {payout_id} cannot move from {from} to {to}")]
    InvalidTransition {
        payout_id: String,
        from: PayoutStatus,
        to: PayoutStatus,
    },

    /// Recompute requested for a payout whose line items are frozen.
    #[error("Payout {payout_id} is {status} and its line items are immutable")]
    Immutable {
        payout_id: String,
        status: PayoutStatus,
    },

    /// Paid confirmation carries a different transfer reference.
    #[error("Payout {payout_id} already bound to transfer {existing}, got {attempted}")]
    ReferenceConflict {
        payout_id: String,
        existing: String,
        attempted: String,
    },

    /// Another computation or transition won the race for this payout.
    #[error("Concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: String, id: String },

    /// No commission rule was effective at the sale's timestamp.
    #[error(
        "No commission rule effective for partner {partner_id} at {at} (sale {})",
        .sale_id.as_deref().unwrap_or("-")
    )]
    RuleMissing {
        partner_id: String,
        sale_id: Option<String>,
        at: DateTime<Utc>,
    },

    /// Period bounds are not a valid half-open interval.
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Currency code is not a three letter ISO-style code.
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// CSV export could not be rendered.
    #[error("Export failed: {0}")]
    Export(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a ConcurrentModification error for a payout.
    pub fn concurrent_payout(id: impl Into<String>) -> Self {
        CoreError::ConcurrentModification {
            entity: "Payout".to_string(),
            id: id.into(),
        }
    }

    /// Returns true for errors produced by lifecycle ordering mistakes.
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            CoreError::EmptyPayout { .. }
                | CoreError::InvalidTransition { .. }
                | CoreError::Immutable { .. }
                | CoreError::ReferenceConflict { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before settlement logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Field is present where it must be absent, or the reverse.
    #[error("{field} {reason}")]
    InvalidShape { field: String, reason: String },

    /// Invalid format (e.g., invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., two rules with the same effective date).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidTransition {
            payout_id: "po-1".to_string(),
            from: PayoutStatus::Paid,
            to: PayoutStatus::Draft,
        };
        assert_eq!(err.to_string(), "Payout po-1 cannot move from paid to draft");

        let err = CoreError::EmptyPayout {
            payout_id: "po-2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Payout po-2 has no line items and cannot be finalized"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "partner_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_lifecycle_error_categorization() {
        assert!(CoreError::EmptyPayout {
            payout_id: "x".into()
        }
        .is_lifecycle_error());
        assert!(!CoreError::concurrent_payout("x").is_lifecycle_error());
        assert!(!CoreError::AmountOverflow.is_lifecycle_error());
    }
}
