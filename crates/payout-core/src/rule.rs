//! # Commission Rules
//!
//! Per-partner commission configuration, versioned by effective date.
//!
//! ## Versioning
//! ```text
//!   effective_from:   2026-01-01        2026-07-01
//!                         │                 │
//!   rule:             flat 15%  ──────► acquisition 20% / 10%
//!                         │                 │
//!   sale 2026-06-30 ──────┘                 │
//!   sale 2026-07-01 ────────────────────────┘
//! ```
//!
//! A sale is valued with the rule effective at its `occurred_at`, never the
//! rule current at computation time. Adding a rule therefore never changes
//! the value of older sales.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Percentage, Sale};
use crate::validation;

// =============================================================================
// Commission Model
// =============================================================================

/// How the commission rate is selected for a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionModel {
    /// One rate for every sale.
    Flat,
    /// `rate` for a buyer's first purchase, `repeat_rate` afterwards.
    Acquisition,
}

impl CommissionModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionModel::Flat => "flat",
            CommissionModel::Acquisition => "acquisition",
        }
    }
}

// =============================================================================
// Commission Rule
// =============================================================================

/// A partner's commission terms from `effective_from` onwards.
///
/// ## Shape Invariant
/// - `Flat`: `repeat_rate` is `None`
/// - `Acquisition`: `repeat_rate` is `Some(r)` with `r <= rate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRule {
    pub id: String,
    pub partner_id: String,
    pub model: CommissionModel,
    pub rate: Percentage,
    pub repeat_rate: Option<Percentage>,
    /// Flat tax applied to the commission base (e.g. 20%).
    pub tax_rate_on_commission: Percentage,
    pub effective_from: DateTime<Utc>,
}

impl CommissionRule {
    /// Creates a flat-rate rule.
    pub fn flat(
        partner_id: impl Into<String>,
        rate: Percentage,
        tax_rate_on_commission: Percentage,
        effective_from: DateTime<Utc>,
    ) -> Self {
        CommissionRule {
            id: Uuid::new_v4().to_string(),
            partner_id: partner_id.into(),
            model: CommissionModel::Flat,
            rate,
            repeat_rate: None,
            tax_rate_on_commission,
            effective_from,
        }
    }

    /// Creates an acquisition rule (first purchase vs repeat purchase).
    pub fn acquisition(
        partner_id: impl Into<String>,
        rate: Percentage,
        repeat_rate: Percentage,
        tax_rate_on_commission: Percentage,
        effective_from: DateTime<Utc>,
    ) -> Self {
        CommissionRule {
            id: Uuid::new_v4().to_string(),
            partner_id: partner_id.into(),
            model: CommissionModel::Acquisition,
            rate,
            repeat_rate: Some(repeat_rate),
            tax_rate_on_commission,
            effective_from,
        }
    }

    /// Checks rate bounds and the model/repeat-rate shape.
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_identifier("partner_id", &self.partner_id)?;
        validation::validate_rate("rate", self.rate)?;
        validation::validate_rate("tax_rate_on_commission", self.tax_rate_on_commission)?;

        match (self.model, self.repeat_rate) {
            (CommissionModel::Flat, None) => Ok(()),
            (CommissionModel::Flat, Some(_)) => Err(ValidationError::InvalidShape {
                field: "repeat_rate".to_string(),
                reason: "must be absent for flat rules".to_string(),
            }
            .into()),
            (CommissionModel::Acquisition, None) => Err(ValidationError::InvalidShape {
                field: "repeat_rate".to_string(),
                reason: "is required for acquisition rules".to_string(),
            }
            .into()),
            (CommissionModel::Acquisition, Some(repeat)) => {
                validation::validate_rate("repeat_rate", repeat)?;
                if repeat > self.rate {
                    return Err(ValidationError::InvalidShape {
                        field: "repeat_rate".to_string(),
                        reason: format!("{} must not exceed rate {}", repeat, self.rate),
                    }
                    .into());
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Rule Schedule
// =============================================================================

/// All commission rules of one partner, ordered by `effective_from`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSchedule {
    rules: Vec<CommissionRule>,
}

impl RuleSchedule {
    /// Builds a schedule from rules in any order.
    ///
    /// Every rule is validated; two rules with the same `effective_from`
    /// are rejected as ambiguous.
    pub fn new(rules: Vec<CommissionRule>) -> CoreResult<Self> {
        let mut schedule = RuleSchedule::default();
        for rule in rules {
            schedule.insert(rule)?;
        }
        Ok(schedule)
    }

    /// Adds a rule, keeping the schedule sorted.
    pub fn insert(&mut self, rule: CommissionRule) -> CoreResult<()> {
        rule.validate()?;
        match self
            .rules
            .binary_search_by(|existing| existing.effective_from.cmp(&rule.effective_from))
        {
            Ok(_) => Err(ValidationError::Duplicate {
                field: "effective_from".to_string(),
                value: rule.effective_from.to_rfc3339(),
            }
            .into()),
            Err(index) => {
                self.rules.insert(index, rule);
                Ok(())
            }
        }
    }

    /// Returns the rule in force at `at`: the latest with `effective_from <= at`.
    pub fn effective_at(&self, at: DateTime<Utc>) -> Option<&CommissionRule> {
        let upper = self.rules.partition_point(|rule| rule.effective_from <= at);
        upper.checked_sub(1).map(|index| &self.rules[index])
    }

    /// Returns the rule for a sale, or `RuleMissing`.
    pub fn rule_for(&self, sale: &Sale) -> CoreResult<&CommissionRule> {
        self.effective_at(sale.occurred_at)
            .ok_or_else(|| CoreError::RuleMissing {
                partner_id: sale.partner_id.clone(),
                sale_id: Some(sale.id.clone()),
                at: sale.occurred_at,
            })
    }

    pub fn rules(&self) -> &[CommissionRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
