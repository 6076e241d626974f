//! # Commission Policy
//!
//! Values one sale under one commission rule.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  rate  = flat        → rule.rate                                        │
//! │          acquisition → first purchase ? rule.rate : rule.repeat_rate    │
//! │                                                                         │
//! │  base  = round_half_even(gross × rate)                                  │
//! │  tax   = round_half_even(base × tax_rate_on_commission)                 │
//! │  net   = gross − base − tax                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scenario: flat 15% with 20% tax on a 100.00 EUR sale gives
//! base 15.00, tax 3.00, net 82.00.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::rule::{CommissionModel, CommissionRule};
use crate::types::{Percentage, Sale};

/// Commission owed on one sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub base: Money,
    pub tax: Money,
}

impl Commission {
    /// `base + tax`.
    pub fn total(&self) -> CoreResult<Money> {
        self.base.checked_add(self.tax)
    }

    /// `gross - base - tax`.
    pub fn net_of(&self, gross: Money) -> CoreResult<Money> {
        gross.checked_sub(self.base)?.checked_sub(self.tax)
    }
}

/// Selects the commission rate the rule applies to this sale.
pub fn applicable_rate(sale: &Sale, rule: &CommissionRule) -> CoreResult<Percentage> {
    match rule.model {
        CommissionModel::Flat => Ok(rule.rate),
        CommissionModel::Acquisition if sale.is_first_purchase_for_buyer => Ok(rule.rate),
        CommissionModel::Acquisition => rule.repeat_rate.ok_or_else(|| {
            CoreError::Validation(ValidationError::InvalidShape {
                field: "repeat_rate".to_string(),
                reason: "is required for acquisition rules".to_string(),
            })
        }),
    }
}

/// Computes the commission base and tax for a sale.
///
/// Both amounts are rounded independently, half to even.
pub fn commission(sale: &Sale, rule: &CommissionRule) -> CoreResult<Commission> {
    let rate = applicable_rate(sale, rule)?;
    let base = sale.gross_amount.apply_percentage(rate)?;
    let tax = base.apply_percentage(rule.tax_rate_on_commission)?;
    Ok(Commission { base, tax })
}

// =============================================================================
// Unit Tests
// =============================================================================
