//! # Payout Aggregator
//!
//! Turns a partner's sales and pending adjustments for one period into a
//! draft payout with line items. Pure: nothing is persisted here.
//!
//! ## Computation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DraftRequest                                                           │
//! │    │                                                                    │
//! │    ├─► 1. Resolve target    existing draft for the exact period? reuse │
//! │    │                        other active overlap?  PeriodOverlap       │
//! │    │                        finalized/paid/failed?  Immutable          │
//! │    │                                                                    │
//! │    ├─► 2. Sales             rule effective at sale.occurred_at         │
//! │    │                        commission → base, tax, net                │
//! │    │                                                                    │
//! │    ├─► 3. Adjustments       effective in period, claimable by target   │
//! │    │                                                                    │
//! │    └─► 4. Totals            Σ line items, replaces prior draft         │
//! │                                                                         │
//! │  DraftPayout { payout, line_items, claimed_adjustments }               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//! Line items are positioned sales-first in `(occurred_at, sequence)` order,
//! then adjustments in `(effective_date, id)` order. Recomputing with the
//! same inputs yields identical line items and totals.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::commission::commission;
use crate::error::{CoreError, CoreResult};
use crate::ledger::sales_in_period;
use crate::lifecycle::PayoutStatus;
use crate::money::{Currency, Money};
use crate::period::Period;
use crate::rule::RuleSchedule;
use crate::types::{Adjustment, LineItemKind, Payout, PayoutLineItem, Sale};

// =============================================================================
// Request / Result
// =============================================================================

/// Everything the aggregator needs for one (partner, period).
#[derive(Debug, Clone, Copy)]
pub struct DraftRequest<'a> {
    pub partner_id: &'a str,
    pub period: Period,
    /// The partner's settlement currency.
    pub currency: Currency,
    /// Settleable sales; anything outside the partner or period is ignored.
    pub sales: &'a [Sale],
    /// Adjustments of the partner; only claimable ones in the period are used.
    pub adjustments: &'a [Adjustment],
    pub rules: &'a RuleSchedule,
    /// Payouts of the partner that could overlap the period.
    pub existing: &'a [Payout],
    pub now: DateTime<Utc>,
}

/// A computed draft, ready to be persisted in one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftPayout {
    pub payout: Payout,
    pub line_items: Vec<PayoutLineItem>,
    /// Adjustments stamped with `payout.id` by this draft.
    pub claimed_adjustments: Vec<String>,
    /// Version the stored draft must still have; `None` for a new payout.
    pub expected_version: Option<i64>,
}

impl DraftPayout {
    /// Ids of the sales this draft settles.
    pub fn sale_ids(&self) -> impl Iterator<Item = &str> {
        self.line_items.iter().filter_map(|line| line.sale_id.as_deref())
    }

    /// Checks if this computation replaces an existing draft.
    pub fn is_recomputation(&self) -> bool {
        self.expected_version.is_some()
    }
}

// =============================================================================
// Target Resolution
// =============================================================================

/// Picks the payout this computation writes to.
///
/// Returns the existing draft for exactly this period, if any.
fn resolve_target<'a>(req: &DraftRequest<'a>) -> CoreResult<Option<&'a Payout>> {
    let mut target = None;
    for payout in req.existing {
        if payout.partner_id != req.partner_id
            || !payout.is_active()
            || !payout.period.overlaps(&req.period)
        {
            continue;
        }
        if payout.period != req.period {
            return Err(CoreError::PeriodOverlap {
                partner_id: req.partner_id.to_string(),
                existing_payout_id: payout.id.clone(),
            });
        }
        target = Some(payout);
    }

    if let Some(payout) = target {
        payout.ensure_recomputable()?;
    }
    Ok(target)
}

// =============================================================================
// Line Items
// =============================================================================

fn sale_line(
    payout_id: &str,
    position: u32,
    sale: &Sale,
    rules: &RuleSchedule,
    currency: Currency,
) -> CoreResult<PayoutLineItem> {
    if sale.currency() != currency {
        return Err(CoreError::CurrencyMismatch {
            left: currency,
            right: sale.currency(),
        });
    }
    let rule = rules.rule_for(sale)?;
    let valued = commission(sale, rule)?;
    Ok(PayoutLineItem {
        payout_id: payout_id.to_string(),
        position,
        kind: LineItemKind::Sale,
        sale_id: Some(sale.id.clone()),
        adjustment_id: None,
        gross_amount: sale.gross_amount,
        commission_base: valued.base,
        commission_tax: valued.tax,
        net_amount: valued.net_of(sale.gross_amount)?,
    })
}

fn adjustment_line(
    payout_id: &str,
    position: u32,
    adjustment: &Adjustment,
    currency: Currency,
) -> CoreResult<PayoutLineItem> {
    if adjustment.amount.currency() != currency {
        return Err(CoreError::CurrencyMismatch {
            left: currency,
            right: adjustment.amount.currency(),
        });
    }
    let zero = Money::zero(currency);
    Ok(PayoutLineItem {
        payout_id: payout_id.to_string(),
        position,
        kind: LineItemKind::Adjustment,
        sale_id: None,
        adjustment_id: Some(adjustment.id.clone()),
        gross_amount: zero,
        commission_base: zero,
        commission_tax: zero,
        net_amount: adjustment.amount,
    })
}

/// Adjustments this payout may claim, in line-item order.
fn claimable_adjustments<'a>(req: &DraftRequest<'a>, payout_id: &str) -> Vec<&'a Adjustment> {
    let mut selected: Vec<&Adjustment> = req
        .adjustments
        .iter()
        .filter(|adj| {
            adj.partner_id == req.partner_id
                && req.period.contains(adj.effective_date)
                && adj.is_claimable_by(payout_id)
        })
        .collect();
    selected.sort_by(|a, b| {
        a.effective_date
            .cmp(&b.effective_date)
            .then_with(|| a.id.cmp(&b.id))
    });
    selected
}

// =============================================================================
// Compute Draft
// =============================================================================

/// Computes the draft payout for one partner and period.
///
/// ## Errors
/// - `PeriodOverlap`: another active payout overlaps the period
/// - `Immutable`: the payout for this exact period is no longer a draft
/// - `RuleMissing`: a sale has no commission rule at its timestamp
/// - `CurrencyMismatch` / `AmountOverflow`: money arithmetic failed
pub fn compute_draft(req: &DraftRequest<'_>) -> CoreResult<DraftPayout> {
    let target = resolve_target(req)?;

    let (mut payout, expected_version) = match target {
        Some(existing) => (existing.clone(), Some(existing.version)),
        None => (
            Payout::draft(
                Uuid::new_v4().to_string(),
                req.partner_id,
                req.period,
                req.currency,
                req.now,
            ),
            None,
        ),
    };

    let mut line_items = Vec::new();

    for sale in sales_in_period(req.sales, req.partner_id, &req.period) {
        let position = line_items.len() as u32;
        line_items.push(sale_line(&payout.id, position, &sale, req.rules, req.currency)?);
    }

    let adjustments = claimable_adjustments(req, &payout.id);
    for adjustment in &adjustments {
        let position = line_items.len() as u32;
        line_items.push(adjustment_line(&payout.id, position, adjustment, req.currency)?);
    }

    let gross_total = Money::sum(req.currency, line_items.iter().map(|l| l.gross_amount))?;
    let commission_total = line_items.iter().try_fold(Money::zero(req.currency), |acc, l| {
        acc.checked_add(l.commission_base)?.checked_add(l.commission_tax)
    })?;
    let adjustment_total = Money::sum(
        req.currency,
        line_items
            .iter()
            .filter(|l| l.kind == LineItemKind::Adjustment)
            .map(|l| l.net_amount),
    )?;
    let net_total = gross_total
        .checked_sub(commission_total)?
        .checked_add(adjustment_total)?;

    payout.status = PayoutStatus::Draft;
    payout.currency = req.currency;
    payout.gross_total = gross_total;
    payout.commission_total = commission_total;
    payout.adjustment_total = adjustment_total;
    payout.net_total = net_total;
    payout.line_item_count = line_items.len() as u32;
    payout.generated_at = req.now;

    Ok(DraftPayout {
        claimed_adjustments: adjustments.iter().map(|a| a.id.clone()).collect(),
        payout,
        line_items,
        expected_version,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::CommissionRule;
    use crate::types::{Percentage, SaleEligibility};
    use chrono::TimeZone;

    const PARTNER: &str = "partner-1";

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap()
    }

    fn eur(minor: i64) -> Money {
        Money::new(minor, Currency::EUR)
    }

    fn sale(id: &str, buyer: &str, gross: i64, day: u32, sequence: i64, first: bool) -> Sale {
        Sale {
            id: id.into(),
            partner_id: PARTNER.into(),
            buyer_id: buyer.into(),
            gross_amount: eur(gross),
            occurred_at: at(day, 12),
            eligibility: SaleEligibility::Paid,
            is_first_purchase_for_buyer: first,
            sequence,
        }
    }

    fn adjustment(id: &str, amount: i64, day: u32) -> Adjustment {
        Adjustment {
            id: id.into(),
            partner_id: PARTNER.into(),
            amount: eur(amount),
            reason: "penalty".into(),
            effective_date: at(day, 0),
            consumed_by_payout_id: None,
            reversed_sale_id: None,
            created_at: at(day, 0),
        }
    }

    fn flat(rate: u32, tax: u32) -> RuleSchedule {
        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        RuleSchedule::new(vec![CommissionRule::flat(
            PARTNER,
            Percentage::from_percent(rate),
            Percentage::from_percent(tax),
            since,
        )])
        .unwrap()
    }

    fn september() -> Period {
        Period::parse_month("2026-09").unwrap()
    }

    fn request<'a>(
        sales: &'a [Sale],
        adjustments: &'a [Adjustment],
        rules: &'a RuleSchedule,
        existing: &'a [Payout],
    ) -> DraftRequest<'a> {
        DraftRequest {
            partner_id: PARTNER,
            period: september(),
            currency: Currency::EUR,
            sales,
            adjustments,
            rules,
            existing,
            now: Utc.with_ymd_and_hms(2026, 10, 1, 6, 0, 0).unwrap(),
        }
    }

    fn assert_conserved(draft: &DraftPayout) {
        let p = &draft.payout;
        let expected = p
            .gross_total
            .checked_sub(p.commission_total)
            .unwrap()
            .checked_add(p.adjustment_total)
            .unwrap();
        assert_eq!(p.net_total, expected);
        let line_net = Money::sum(Currency::EUR, draft.line_items.iter().map(|l| l.net_amount)).unwrap();
        assert_eq!(p.net_total, line_net);
    }

    #[test]
    fn test_flat_rate_with_tax_single_sale() {
        let sales = vec![sale("s-1", "b-1", 10_000, 5, 1, true)];
        let rules = flat(15, 20);
        let draft = compute_draft(&request(&sales, &[], &rules, &[])).unwrap();

        let line = &draft.line_items[0];
        assert_eq!(line.commission_base, eur(1_500));
        assert_eq!(line.commission_tax, eur(300));
        assert_eq!(line.net_amount, eur(8_200));
        assert_eq!(draft.payout.net_total, eur(8_200));
        assert_eq!(draft.payout.commission_total, eur(1_800));
        assert_eq!(draft.payout.status, PayoutStatus::Draft);
        assert!(!draft.is_recomputation());
        assert_conserved(&draft);
    }

    #[test]
    fn test_acquisition_first_and_repeat_sale() {
        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let rules = RuleSchedule::new(vec![CommissionRule::acquisition(
            PARTNER,
            Percentage::from_percent(20),
            Percentage::from_percent(10),
            Percentage::zero(),
            since,
        )])
        .unwrap();
        let sales = vec![
            sale("s-2", "b-1", 5_000, 9, 2, false),
            sale("s-1", "b-1", 5_000, 3, 1, true),
        ];
        let draft = compute_draft(&request(&sales, &[], &rules, &[])).unwrap();

        assert_eq!(draft.line_items[0].sale_id.as_deref(), Some("s-1"));
        assert_eq!(draft.line_items[0].commission_base, eur(1_000));
        assert_eq!(draft.line_items[1].commission_base, eur(500));
        assert_conserved(&draft);
    }

    #[test]
    fn test_penalty_adjustment_merged() {
        let sales = vec![sale("s-1", "b-1", 10_000, 5, 1, true)];
        let adjustments = vec![adjustment("adj-1", -500, 10)];
        let rules = flat(15, 0);
        let draft = compute_draft(&request(&sales, &adjustments, &rules, &[])).unwrap();

        assert_eq!(draft.payout.gross_total, eur(10_000));
        assert_eq!(draft.payout.commission_total, eur(1_500));
        assert_eq!(draft.payout.adjustment_total, eur(-500));
        assert_eq!(draft.payout.net_total, eur(8_000));
        assert_eq!(draft.payout.line_item_count, 2);
        assert_eq!(draft.claimed_adjustments, vec!["adj-1".to_string()]);

        let adj_line = &draft.line_items[1];
        assert_eq!(adj_line.kind, LineItemKind::Adjustment);
        assert!(adj_line.sale_id.is_none());
        assert!(adj_line.gross_amount.is_zero());
        assert_conserved(&draft);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let sales = vec![
            sale("s-1", "b-1", 10_000, 5, 1, true),
            sale("s-2", "b-2", 3_333, 5, 2, true),
        ];
        let adjustments = vec![adjustment("adj-1", 250, 7)];
        let rules = flat(15, 20);

        let first = compute_draft(&request(&sales, &adjustments, &rules, &[])).unwrap();

        // Persisted state after the first computation
        let mut stored = first.payout.clone();
        stored.version = 1;
        let mut claimed = adjustments.clone();
        claimed[0].consumed_by_payout_id = Some(stored.id.clone());
        let existing = vec![stored.clone()];

        let second = compute_draft(&request(&sales, &claimed, &rules, &existing)).unwrap();
        let third = compute_draft(&request(&sales, &claimed, &rules, &existing)).unwrap();

        assert_eq!(second.payout.id, stored.id);
        assert_eq!(second.expected_version, Some(1));
        assert_eq!(first.line_items, second.line_items);
        assert_eq!(second, third);
        assert_eq!(first.payout.net_total, second.payout.net_total);
        assert_eq!(first.payout.gross_total, second.payout.gross_total);
    }

    #[test]
    fn test_overlapping_active_payout_rejected() {
        let rules = flat(15, 0);
        let mid: Period = "2026-09-15..2026-10-15".parse().unwrap();
        let other = Payout::draft("po-other", PARTNER, mid, Currency::EUR, at(20, 0));
        let err = compute_draft(&request(&[], &[], &rules, &[other])).unwrap_err();
        assert!(matches!(
            err,
            CoreError::PeriodOverlap { ref existing_payout_id, .. } if existing_payout_id == "po-other"
        ));
    }

    #[test]
    fn test_cancelled_payout_does_not_block() {
        let rules = flat(15, 0);
        let mut cancelled = Payout::draft("po-old", PARTNER, september(), Currency::EUR, at(20, 0));
        cancelled.status = PayoutStatus::Cancelled;
        let sales = vec![sale("s-1", "b-1", 1_000, 5, 1, true)];
        let draft = compute_draft(&request(&sales, &[], &rules, &[cancelled])).unwrap();
        assert_ne!(draft.payout.id, "po-old");
        assert!(draft.expected_version.is_none());
    }

    #[test]
    fn test_finalized_payout_is_immutable() {
        let rules = flat(15, 0);
        let mut finalized = Payout::draft("po-1", PARTNER, september(), Currency::EUR, at(20, 0));
        finalized.status = PayoutStatus::Finalized;
        let err = compute_draft(&request(&[], &[], &rules, &[finalized])).unwrap_err();
        assert!(matches!(err, CoreError::Immutable { status: PayoutStatus::Finalized, .. }));
    }

    #[test]
    fn test_reopened_draft_keeps_failure_audit() {
        let rules = flat(15, 0);
        let mut reopened = Payout::draft("po-1", PARTNER, september(), Currency::EUR, at(20, 0));
        reopened.failure_reason = Some("account closed".into());
        reopened.version = 4;
        let sales = vec![sale("s-1", "b-1", 1_000, 5, 1, true)];
        let draft = compute_draft(&request(&sales, &[], &rules, &[reopened])).unwrap();
        assert_eq!(draft.payout.id, "po-1");
        assert_eq!(draft.payout.failure_reason.as_deref(), Some("account closed"));
        assert_eq!(draft.expected_version, Some(4));
    }

    #[test]
    fn test_missing_rule_fails_computation() {
        let rules = RuleSchedule::default();
        let sales = vec![sale("s-1", "b-1", 1_000, 5, 1, true)];
        let err = compute_draft(&request(&sales, &[], &rules, &[])).unwrap_err();
        assert!(matches!(err, CoreError::RuleMissing { ref sale_id, .. } if sale_id.as_deref() == Some("s-1")));
    }

    #[test]
    fn test_rule_effective_at_sale_time_not_now() {
        let rules = RuleSchedule::new(vec![
            CommissionRule::flat(
                PARTNER,
                Percentage::from_percent(15),
                Percentage::zero(),
                Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            ),
            CommissionRule::flat(
                PARTNER,
                Percentage::from_percent(10),
                Percentage::zero(),
                at(10, 0),
            ),
        ])
        .unwrap();
        let sales = vec![
            sale("s-1", "b-1", 1_000, 5, 1, true),
            sale("s-2", "b-2", 1_000, 12, 2, true),
        ];
        let draft = compute_draft(&request(&sales, &[], &rules, &[])).unwrap();
        assert_eq!(draft.line_items[0].commission_base, eur(150));
        assert_eq!(draft.line_items[1].commission_base, eur(100));
    }

    #[test]
    fn test_adjustments_outside_period_or_claimed_elsewhere_are_skipped() {
        let rules = flat(15, 0);
        let mut elsewhere = adjustment("adj-2", -100, 12);
        elsewhere.consumed_by_payout_id = Some("po-other".into());
        let adjustments = vec![
            adjustment("adj-1", -100, 12),
            elsewhere,
            Adjustment {
                effective_date: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
                ..adjustment("adj-3", -100, 1)
            },
        ];
        let draft = compute_draft(&request(&[], &adjustments, &rules, &[])).unwrap();
        assert_eq!(draft.claimed_adjustments, vec!["adj-1".to_string()]);
        assert_eq!(draft.payout.net_total, eur(-100));
    }

    #[test]
    fn test_sale_at_period_end_belongs_to_next_period() {
        let rules = flat(15, 0);
        let mut boundary = sale("s-1", "b-1", 1_000, 5, 1, true);
        boundary.occurred_at = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let draft = compute_draft(&request(&[boundary], &[], &rules, &[])).unwrap();
        assert_eq!(draft.payout.line_item_count, 0);
        assert!(draft.payout.net_total.is_zero());
    }

    #[test]
    fn test_foreign_currency_sale_is_rejected() {
        let rules = flat(15, 0);
        let mut usd = sale("s-1", "b-1", 1_000, 5, 1, true);
        usd.gross_amount = Money::new(1_000, Currency::USD);
        assert!(matches!(
            compute_draft(&request(&[usd], &[], &rules, &[])),
            Err(CoreError::CurrencyMismatch { .. })
        ));
    }
}
