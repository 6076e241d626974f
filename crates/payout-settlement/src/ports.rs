//! # Collaborator Ports
//!
//! Capability traits for everything the settlement engine consumes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SettlementService                               │
//! │                                                                         │
//! │   BookingSource ────────── settleable sales for (partner, period)      │
//! │   PartnerConfigSource ──── partner directory + commission rules        │
//! │   TransferProvider ─────── initiate_transfer → transfer reference      │
//! │                            (confirmation arrives later as a webhook)   │
//! │   NotificationSink ─────── fire-and-forget partner notices             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite-backed implementations of the first two live in
//! [`sources`](crate::sources).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payout_core::{CommissionRule, Money, Partner, Period, RuleSchedule, Sale};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SettlementResult;

// =============================================================================
// Booking Source
// =============================================================================

/// Source of settleable sales.
#[async_trait]
pub trait BookingSource: Send + Sync {
    /// Lists a partner's settleable sales with `occurred_at` in `period`,
    /// in `(occurred_at, sequence)` order.
    ///
    /// Sales claimed by a payout other than `claimant` are not settleable.
    async fn list_settleable_sales(
        &self,
        partner_id: &str,
        period: &Period,
        claimant: Option<&str>,
    ) -> SettlementResult<Vec<Sale>>;
}

// =============================================================================
// Partner Configuration Source
// =============================================================================

/// Source of partner settings and commission terms.
#[async_trait]
pub trait PartnerConfigSource: Send + Sync {
    /// Looks up a partner, failing with `NotFound`.
    async fn partner(&self, partner_id: &str) -> SettlementResult<Partner>;

    /// The rule in force for a partner at `at`, failing with `RuleMissing`.
    async fn commission_rule_effective_at(
        &self,
        partner_id: &str,
        at: DateTime<Utc>,
    ) -> SettlementResult<CommissionRule>;

    /// Every rule version of a partner.
    async fn rule_schedule(&self, partner_id: &str) -> SettlementResult<RuleSchedule>;
}

// =============================================================================
// Transfer Provider
// =============================================================================

/// Failure reported by a transfer provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The provider could not be reached or timed out. Retried.
    #[error("network failure: {0}")]
    Network(String),

    /// The provider refused the transfer. Never retried.
    #[error("declined: {0}")]
    Declined(String),
}

impl TransferError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::Network(_))
    }
}

/// Funds transfer provider.
#[async_trait]
pub trait TransferProvider: Send + Sync {
    /// Starts a transfer and returns the provider's reference for it.
    async fn initiate_transfer(
        &self,
        payout_id: &str,
        net_amount: Money,
        destination: &str,
    ) -> Result<String, TransferError>;
}

// =============================================================================
// Notification Sink
// =============================================================================

/// Partner-facing payout events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutEvent {
    #[serde(rename = "payout.available")]
    Available,
    #[serde(rename = "payout.paid")]
    Paid,
    #[serde(rename = "payout.failed")]
    Failed,
}

impl PayoutEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutEvent::Available => "payout.available",
            PayoutEvent::Paid => "payout.paid",
            PayoutEvent::Failed => "payout.failed",
        }
    }
}

impl std::fmt::Display for PayoutEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery failure of a notification.
#[derive(Debug, Clone, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Fire-and-forget notification channel.
///
/// Failures are logged by the caller and never undo the state transition
/// that triggered them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        partner_id: &str,
        event: PayoutEvent,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(PayoutEvent::Available.to_string(), "payout.available");
        assert_eq!(
            serde_json::to_string(&PayoutEvent::Paid).unwrap(),
            "\"payout.paid\""
        );
    }

    #[test]
    fn test_only_network_failures_retry() {
        assert!(TransferError::Network("timeout".into()).is_retryable());
        assert!(!TransferError::Declined("account closed".into()).is_retryable());
    }
}
