//! # Payout Lifecycle
//!
//! The payout status state machine and its transition operations.
//!
//! ## State Diagram
//! ```text
//!                 finalize            mark_paid
//!   ┌───────┐  ───────────►  ┌───────────┐  ──────────►  ┌──────┐
//!   │ draft │                │ finalized │               │ paid │ (terminal)
//!   └───────┘  ◄─────┐       └───────────┘               └──────┘
//!       │            │             │
//!       │ cancel     │ reopen      │ mark_failed
//!       ▼            │             ▼
//!   ┌───────────┐    │        ┌────────┐
//!   │ cancelled │    └─────── │ failed │
//!   └───────────┘             └────────┘
//!    (terminal)
//! ```
//!
//! - Line items may only change while `draft`.
//! - `finalized → cancelled` is not allowed; a failed attempt must be
//!   recorded first so the audit trail keeps it.
//! - `mark_paid` is idempotent for the same transfer reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::Payout;
use crate::validation;

// =============================================================================
// Payout Status
// =============================================================================

/// Payout lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Recomputable; line items replaced wholesale on each computation.
    Draft,
    /// Approved by an operator; line items frozen.
    Finalized,
    /// Transfer confirmed by the provider.
    Paid,
    /// Released; no longer occupies its period.
    Cancelled,
    /// Transfer declined or manually failed; may be reopened.
    Failed,
}

/// Allowed `(from, to)` pairs. Anything else is `InvalidTransition`.
const TRANSITIONS: &[(PayoutStatus, PayoutStatus)] = &[
    (PayoutStatus::Draft, PayoutStatus::Finalized),
    (PayoutStatus::Draft, PayoutStatus::Cancelled),
    (PayoutStatus::Finalized, PayoutStatus::Paid),
    (PayoutStatus::Finalized, PayoutStatus::Failed),
    (PayoutStatus::Failed, PayoutStatus::Draft),
];

impl PayoutStatus {
    pub const ALL: [PayoutStatus; 5] = [
        PayoutStatus::Draft,
        PayoutStatus::Finalized,
        PayoutStatus::Paid,
        PayoutStatus::Cancelled,
        PayoutStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Draft => "draft",
            PayoutStatus::Finalized => "finalized",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Cancelled => "cancelled",
            PayoutStatus::Failed => "failed",
        }
    }

    /// Checks the transition table.
    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        TRANSITIONS.contains(&(*self, next))
    }

    /// Every status except `cancelled` occupies its period.
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, PayoutStatus::Cancelled)
    }

    /// Paid and cancelled payouts never change again.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Paid | PayoutStatus::Cancelled)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PayoutStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ValidationError::InvalidFormat {
                    field: "status".to_string(),
                    reason: format!("unknown payout status '{s}'"),
                }
                .into()
            })
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// Whether a lifecycle call changed the payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The payout changed and must be persisted.
    Applied,
    /// The call repeated an earlier one; nothing changed.
    AlreadyApplied,
}

impl Payout {
    fn transition(&mut self, to: PayoutStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                payout_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Fails with `Immutable` unless the line items may still be replaced.
    pub fn ensure_recomputable(&self) -> CoreResult<()> {
        if self.status != PayoutStatus::Draft {
            return Err(CoreError::Immutable {
                payout_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// `draft → finalized`. Freezes line items and stamps `finalized_at`.
    ///
    /// The status check runs first, so finalizing an empty paid payout
    /// reports `InvalidTransition`, not `EmptyPayout`.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> CoreResult<TransitionOutcome> {
        if !self.status.can_transition_to(PayoutStatus::Finalized) {
            return Err(CoreError::InvalidTransition {
                payout_id: self.id.clone(),
                from: self.status,
                to: PayoutStatus::Finalized,
            });
        }
        if self.line_item_count == 0 {
            return Err(CoreError::EmptyPayout {
                payout_id: self.id.clone(),
            });
        }
        self.transition(PayoutStatus::Finalized)?;
        self.finalized_at = Some(now);
        Ok(TransitionOutcome::Applied)
    }

    /// Binds a transfer reference to a finalized payout before confirmation.
    pub fn record_transfer_reference(&mut self, reference: &str) -> CoreResult<TransitionOutcome> {
        validation::validate_identifier("transfer_reference", reference)?;
        if self.status != PayoutStatus::Finalized {
            return Err(CoreError::InvalidTransition {
                payout_id: self.id.clone(),
                from: self.status,
                to: PayoutStatus::Paid,
            });
        }
        match self.transfer_reference.as_deref() {
            Some(existing) if existing == reference => Ok(TransitionOutcome::AlreadyApplied),
            Some(existing) => Err(CoreError::ReferenceConflict {
                payout_id: self.id.clone(),
                existing: existing.to_string(),
                attempted: reference.to_string(),
            }),
            None => {
                self.transfer_reference = Some(reference.to_string());
                Ok(TransitionOutcome::Applied)
            }
        }
    }

    /// `finalized → paid`.
    ///
    /// ## Idempotency
    /// ```text
    /// status=paid,      same reference      → AlreadyApplied (paid_at kept)
    /// status=paid,      other reference     → ReferenceConflict
    /// status=finalized, pending other ref   → ReferenceConflict
    /// status=finalized                      → Applied
    /// anything else                         → InvalidTransition
    /// ```
    pub fn mark_paid(&mut self, reference: &str, now: DateTime<Utc>) -> CoreResult<TransitionOutcome> {
        validation::validate_identifier("transfer_reference", reference)?;
        match (self.status, self.transfer_reference.as_deref()) {
            (PayoutStatus::Paid, Some(existing)) if existing == reference => {
                Ok(TransitionOutcome::AlreadyApplied)
            }
            (PayoutStatus::Paid, existing) | (PayoutStatus::Finalized, existing @ Some(_))
                if existing != Some(reference) =>
            {
                Err(CoreError::ReferenceConflict {
                    payout_id: self.id.clone(),
                    existing: existing.unwrap_or_default().to_string(),
                    attempted: reference.to_string(),
                })
            }
            _ => {
                self.transition(PayoutStatus::Paid)?;
                self.transfer_reference = Some(reference.to_string());
                self.paid_at = Some(now);
                Ok(TransitionOutcome::Applied)
            }
        }
    }

    /// `finalized → failed`, keeping the reason for audit.
    ///
    /// Repeating the call with the same reason on a failed payout is a no-op.
    pub fn mark_failed(&mut self, reason: &str, now: DateTime<Utc>) -> CoreResult<TransitionOutcome> {
        validation::validate_reason(reason)?;
        if self.status == PayoutStatus::Failed && self.failure_reason.as_deref() == Some(reason) {
            return Ok(TransitionOutcome::AlreadyApplied);
        }
        self.transition(PayoutStatus::Failed)?;
        self.failure_reason = Some(reason.to_string());
        self.failed_at = Some(now);
        Ok(TransitionOutcome::Applied)
    }

    /// `failed → draft`. Clears `finalized_at` and the stale transfer
    /// reference; the failure reason stays for audit.
    pub fn reopen(&mut self) -> CoreResult<TransitionOutcome> {
        self.transition(PayoutStatus::Draft)?;
        self.finalized_at = None;
        self.transfer_reference = None;
        Ok(TransitionOutcome::Applied)
    }

    /// `draft → cancelled`. The caller releases the claimed sales and
    /// adjustments in the same unit of work.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<TransitionOutcome> {
        if self.status == PayoutStatus::Cancelled {
            return Ok(TransitionOutcome::AlreadyApplied);
        }
        self.transition(PayoutStatus::Cancelled)?;
        self.cancelled_at = Some(now);
        Ok(TransitionOutcome::Applied)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
