//! # Validation Module
//!
//! Input validation utilities for the payout engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (payout-api)                                    │
//! │  ├── Type validation (serde deserialization)                           │
//! │  └── Query parameter parsing (periods, statuses)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Identifiers, reasons, rates                                       │
//! │  └── Non-negative sale amounts                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK and NOT NULL constraints                                    │
//! │  ├── Partial UNIQUE index on active payout periods                     │
//! │  └── settled_sales primary key (no double settlement)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use payout_core::validation::{validate_identifier, validate_rate};
//! use payout_core::types::Percentage;
//!
//! validate_identifier("partner_id", "partner-42").unwrap();
//! assert!(validate_rate("rate", Percentage::from_bps(12_000)).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::Percentage;
use crate::{MAX_IDENTIFIER_LEN, MAX_REASON_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an opaque identifier (partner, buyer, payout, transfer reference).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `MAX_IDENTIFIER_LEN` characters
/// - No whitespace or control characters inside
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates an audit reason (adjustments, failures).
///
/// ## Example
/// ```rust
/// use payout_core::validation::validate_reason;
///
/// assert!(validate_reason("late cancellation penalty").is_ok());
/// assert!(validate_reason("   ").is_err());
/// ```
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a percentage is within 0% to 100%.
pub fn validate_rate(field: &str, rate: Percentage) -> ValidationResult<()> {
    if rate > Percentage::FULL {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Percentage::FULL.bps() as i64,
        });
    }
    Ok(())
}

/// Validates an amount is zero or positive.
///
/// Sale gross amounts use this; refunds go through adjustments.
pub fn validate_non_negative(field: &str, amount: &Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
