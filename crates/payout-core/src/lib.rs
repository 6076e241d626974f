//! # payout-core: Pure Settlement Logic
//!
//! This crate is the **heart** of the payout engine. It turns sales and
//! adjustments into auditable partner payouts as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Payout Engine Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    payout-api (axum)                            │   │
//! │  │    /payouts  /payouts/{id}/finalize  /payouts/export  webhooks  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            payout-settlement (Service + Driver)                 │   │
//! │  │    locks, transfer retries, notifications, batch runs          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ payout-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │ commission│  │ aggregator │  │ lifecycle │  │   │
//! │  │   │   Money   │  │ base, tax │  │ DraftPayout│  │ transitions│ │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    payout-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money and Currency with integer arithmetic (no floating point!)
//! - [`types`] - Domain types (Partner, Sale, Adjustment, Payout, ...)
//! - [`period`] - Half-open settlement periods and cadences
//! - [`rule`] - Commission rules versioned by effective date
//! - [`commission`] - Commission policy for one sale
//! - [`ledger`] - Sale ordering and first-purchase derivation
//! - [`aggregator`] - Draft payout computation
//! - [`lifecycle`] - Payout status state machine
//! - [`export`] - CSV export of payouts awaiting transfer
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use payout_core::commission::commission;
//! use payout_core::money::{Currency, Money};
//! use payout_core::rule::CommissionRule;
//! use payout_core::types::{Percentage, Sale, SaleEligibility};
//!
//! let rule = CommissionRule::flat(
//!     "partner-1",
//!     Percentage::from_percent(15),
//!     Percentage::from_percent(20),
//!     Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
//! );
//! let sale = Sale {
//!     id: "sale-1".into(),
//!     partner_id: "partner-1".into(),
//!     buyer_id: "buyer-1".into(),
//!     gross_amount: Money::new(10_000, Currency::EUR),
//!     occurred_at: Utc.with_ymd_and_hms(2026, 9, 5, 12, 0, 0).unwrap(),
//!     eligibility: SaleEligibility::Paid,
//!     is_first_purchase_for_buyer: true,
//!     sequence: 1,
//! };
//!
//! let c = commission(&sale, &rule).unwrap();
//! assert_eq!(c.base.to_string(), "15.00 EUR");
//! assert_eq!(c.tax.to_string(), "3.00 EUR");
//! assert_eq!(c.net_of(sale.gross_amount).unwrap().to_string(), "82.00 EUR");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregator;
pub mod commission;
pub mod error;
pub mod export;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod period;
pub mod rule;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use payout_core::Money` instead of
// `use payout_core::money::Money`

pub use aggregator::{compute_draft, DraftPayout, DraftRequest};
pub use commission::{commission, Commission};
pub use error::{CoreError, CoreResult, ValidationError};
pub use export::{render_csv, ExportRow};
pub use lifecycle::{PayoutStatus, TransitionOutcome};
pub use money::{Currency, Money};
pub use period::{Period, PeriodCadence};
pub use rule::{CommissionModel, CommissionRule, RuleSchedule};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of partner, buyer, payout and transfer identifiers.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Maximum length of an adjustment or failure reason.
///
/// ## Business Reason
/// Reasons are audit notes, not documents. Longer text belongs in the
/// operator's ticketing system.
pub const MAX_REASON_LEN: usize = 500;
