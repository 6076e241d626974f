//! # Domain Types
//!
//! Core domain types used throughout the payout engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Partner      │   │      Sale       │   │   Adjustment    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id, sequence   │   │  id             │       │
//! │  │  business_name  │   │  buyer_id       │   │  amount (±)     │       │
//! │  │  currency       │   │  gross_amount   │   │  effective_date │       │
//! │  │  destination    │   │  first purchase │   │  consumed_by    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Percentage    │   │  PayoutLineItem │   │     Payout      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  kind           │   │  period         │       │
//! │  │  1500 = 15%     │   │  gross/base/tax │   │  status         │       │
//! │  └─────────────────┘   │  net            │   │  totals         │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales are immutable once recorded. Payout line items are immutable once
//! the payout leaves `draft`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreResult;
use crate::lifecycle::PayoutStatus;
use crate::money::{Currency, Money};
use crate::period::Period;
use crate::validation;

// =============================================================================
// Percentage
// =============================================================================

/// A rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1500 bps = 15% commission, 2000 bps = 20% tax on commission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(u32);

impl Percentage {
    /// 100%.
    pub const FULL: Percentage = Percentage(10_000);

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Creates a rate from whole percent (15 → 15%).
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        Percentage(pct * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Partner
// =============================================================================

/// A partner receiving periodic payouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    /// Shown in the pending-transfer export.
    pub business_name: String,
    /// Settlement currency; every sale and adjustment must use it.
    pub currency: Currency,
    /// Opaque destination handed to the transfer provider (IBAN, account id).
    pub payout_destination: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// How a sale became settleable. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleEligibility {
    /// Booking confirmed by the partner.
    Confirmed,
    /// Order paid by the buyer.
    Paid,
}

impl SaleEligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleEligibility::Confirmed => "confirmed",
            SaleEligibility::Paid => "paid",
        }
    }
}

/// One settleable booking or order. Immutable once recorded.
///
/// ## Stable Ordering
/// Sales sort by `(occurred_at, sequence)`. `sequence` is the creation
/// sequence number and breaks ties between identical timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub partner_id: String,
    pub buyer_id: String,
    pub gross_amount: Money,
    pub occurred_at: DateTime<Utc>,
    pub eligibility: SaleEligibility,
    /// Derived once at creation; never recomputed.
    pub is_first_purchase_for_buyer: bool,
    /// Creation sequence number.
    pub sequence: i64,
}

impl Sale {
    /// Returns the sale currency.
    #[inline]
    pub fn currency(&self) -> Currency {
        self.gross_amount.currency()
    }

    /// Returns the `(occurred_at, sequence)` ordering key.
    #[inline]
    pub fn ordering_key(&self) -> (DateTime<Utc>, i64) {
        (self.occurred_at, self.sequence)
    }
}

/// Input for recording a new sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub partner_id: String,
    pub buyer_id: String,
    pub gross_amount: Money,
    pub occurred_at: DateTime<Utc>,
    pub eligibility: SaleEligibility,
}

impl NewSale {
    /// Validates identifiers and rejects negative gross amounts.
    ///
    /// Refunds flow through the adjustment ledger, never as negative sales.
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_identifier("partner_id", &self.partner_id)?;
        validation::validate_identifier("buyer_id", &self.buyer_id)?;
        validation::validate_non_negative("gross_amount", &self.gross_amount)?;
        Ok(())
    }

    /// Builds the immutable sale once its id, sequence and first-purchase
    /// flag are known.
    pub fn into_sale(self, id: String, sequence: i64, is_first_purchase_for_buyer: bool) -> Sale {
        Sale {
            id,
            partner_id: self.partner_id,
            buyer_id: self.buyer_id,
            gross_amount: self.gross_amount,
            occurred_at: self.occurred_at,
            eligibility: self.eligibility,
            is_first_purchase_for_buyer,
            sequence,
        }
    }
}

// =============================================================================
// Adjustment
// =============================================================================

/// A manual correction (penalty or credit) merged into a payout.
///
/// Append-only. Pending while `consumed_by_payout_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: String,
    pub partner_id: String,
    /// Signed: negative for penalties and reversals, positive for credits.
    pub amount: Money,
    pub reason: String,
    pub effective_date: DateTime<Utc>,
    pub consumed_by_payout_id: Option<String>,
    /// Set on compensating entries; a sale is reversed at most once.
    #[serde(default)]
    pub reversed_sale_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Adjustment {
    /// Checks if no payout has claimed this adjustment.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.consumed_by_payout_id.is_none()
    }

    /// Checks if `payout_id` may claim this adjustment: it is pending, or
    /// already claimed by that same draft (recomputation).
    pub fn is_claimable_by(&self, payout_id: &str) -> bool {
        match &self.consumed_by_payout_id {
            None => true,
            Some(owner) => owner == payout_id,
        }
    }
}

/// Input for appending an adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdjustment {
    pub partner_id: String,
    pub amount: Money,
    pub reason: String,
    pub effective_date: DateTime<Utc>,
}

impl NewAdjustment {
    /// Validates identifiers and the audit reason.
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_identifier("partner_id", &self.partner_id)?;
        validation::validate_reason(&self.reason)?;
        Ok(())
    }
}

// =============================================================================
// Payout Line Item
// =============================================================================

/// Whether a line item values a sale or carries an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Sale,
    Adjustment,
}

impl LineItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemKind::Sale => "sale",
            LineItemKind::Adjustment => "adjustment",
        }
    }
}

/// One line of a payout.
///
/// For `Sale` lines: `net = gross - commission_base - commission_tax`.
/// For `Adjustment` lines: gross, base and tax are zero and `net` carries
/// the signed adjustment amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutLineItem {
    pub payout_id: String,
    /// Zero-based position; sales first in ledger order, then adjustments.
    pub position: u32,
    pub kind: LineItemKind,
    pub sale_id: Option<String>,
    pub adjustment_id: Option<String>,
    pub gross_amount: Money,
    pub commission_base: Money,
    pub commission_tax: Money,
    pub net_amount: Money,
}

// =============================================================================
// Payout
// =============================================================================

/// The settlement header for one partner and one period.
///
/// ## Totals
/// ```text
/// gross_total       = Σ line.gross_amount
/// commission_total  = Σ line.commission_base + line.commission_tax
/// adjustment_total  = Σ adjustment line.net_amount
/// net_total         = gross_total - commission_total + adjustment_total
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: String,
    pub partner_id: String,
    pub period: Period,
    pub status: PayoutStatus,
    pub currency: Currency,
    pub gross_total: Money,
    pub commission_total: Money,
    pub adjustment_total: Money,
    pub net_total: Money,
    pub line_item_count: u32,
    pub generated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub transfer_reference: Option<String>,
    pub failure_reason: Option<String>,
    /// Optimistic concurrency version, bumped on every persisted change.
    pub version: i64,
}

impl Payout {
    /// Creates an empty draft header with zero totals.
    pub fn draft(
        id: impl Into<String>,
        partner_id: impl Into<String>,
        period: Period,
        currency: Currency,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let zero = Money::zero(currency);
        Payout {
            id: id.into(),
            partner_id: partner_id.into(),
            period,
            status: PayoutStatus::Draft,
            currency,
            gross_total: zero,
            commission_total: zero,
            adjustment_total: zero,
            net_total: zero,
            line_item_count: 0,
            generated_at,
            finalized_at: None,
            paid_at: None,
            failed_at: None,
            cancelled_at: None,
            transfer_reference: None,
            failure_reason: None,
            version: 0,
        }
    }

    /// Checks if the payout still occupies its period (not cancelled).
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_percentage_constructors() {
        assert_eq!(Percentage::from_percent(15).bps(), 1_500);
        assert_eq!(Percentage::from_bps(825).to_string(), "8.25%");
        assert!(Percentage::zero().is_zero());
    }

    #[test]
    fn test_new_sale_rejects_negative_gross() {
        let sale = NewSale {
            partner_id: "partner-1".into(),
            buyer_id: "buyer-1".into(),
            gross_amount: Money::new(-100, Currency::EUR),
            occurred_at: Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap(),
            eligibility: SaleEligibility::Paid,
        };
        assert!(sale.validate().is_err());
    }

    #[test]
    fn test_adjustment_claimability() {
        let mut adjustment = Adjustment {
            id: "adj-1".into(),
            partner_id: "partner-1".into(),
            amount: Money::new(-500, Currency::EUR),
            reason: "late cancellation penalty".into(),
            effective_date: Utc.with_ymd_and_hms(2026, 9, 3, 0, 0, 0).unwrap(),
            consumed_by_payout_id: None,
            reversed_sale_id: None,
            created_at: Utc.with_ymd_and_hms(2026, 9, 3, 0, 0, 0).unwrap(),
        };
        assert!(adjustment.is_pending());
        assert!(adjustment.is_claimable_by("po-1"));

        adjustment.consumed_by_payout_id = Some("po-1".into());
        assert!(!adjustment.is_pending());
        assert!(adjustment.is_claimable_by("po-1"));
        assert!(!adjustment.is_claimable_by("po-2"));
    }

    #[test]
    fn test_eligibility_serde() {
        let json = serde_json::to_string(&SaleEligibility::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
        assert_eq!(LineItemKind::Adjustment.as_str(), "adjustment");
    }
}
