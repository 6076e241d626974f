//! # Repository Module
//!
//! Database repository implementations for the payout engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  SettlementService                                                     │
//! │       │                                                                 │
//! │       │  db.payouts().save_draft(&draft)                               │
//! │       ▼                                                                 │
//! │  PayoutRepository                                                      │
//! │  ├── get(&self, id)                                                    │
//! │  ├── save_draft(&self, draft)          one transaction                 │
//! │  └── update_lifecycle(&self, payout)   compare-and-swap on version     │
//! │       │                                                                 │
//! │       │  SQL Query (runtime-bound, mapped via *Record structs)         │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`PartnerRepository`](partner::PartnerRepository) - Partner directory
//! - [`RuleRepository`](rule::RuleRepository) - Commission rule versions
//! - [`SaleRepository`](sale::SaleRepository) - Booking ledger
//! - [`AdjustmentRepository`](adjustment::AdjustmentRepository) - Adjustment ledger
//! - [`PayoutRepository`](payout::PayoutRepository) - Payout headers and line items
//!
//! ## Timestamps
//! Every timestamp is bound as fixed-width RFC 3339 UTC text with
//! microseconds, so SQL range filters compare correctly as strings.

pub mod adjustment;
pub mod partner;
pub mod payout;
pub mod rule;
pub mod sale;

use chrono::{DateTime, SecondsFormat, Utc};
use payout_core::{Currency, Money};

use crate::error::{DbError, DbResult};

/// Encodes a timestamp for storage and range comparison.
pub(crate) fn encode_ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Encodes an optional timestamp.
pub(crate) fn encode_opt_ts(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.as_ref().map(encode_ts)
}

/// Decodes a stored currency code.
pub(crate) fn decode_currency(code: &str) -> DbResult<Currency> {
    Currency::new(code).map_err(|e| DbError::corrupt("currency", e))
}

/// Rebuilds a Money value from its stored columns.
pub(crate) fn decode_money(minor: i64, currency: Currency) -> Money {
    Money::new(minor, currency)
}
