//! # Settlement Service
//!
//! Every settlement operation, wired to its collaborators.
//!
//! ## Draft Computation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  compute_draft(partner, period)                                         │
//! │                                                                         │
//! │  1. PeriodLocks::try_acquire(partner, period.start)  busy → Concurrent  │
//! │  2. partner, active overlapping payouts, claimant draft                 │
//! │  3. BookingSource        settleable sales (unclaimed or ours)           │
//! │     adjustments          pending or ours, effective in period           │
//! │     PartnerConfigSource  rule schedule                                  │
//! │  4. payout_core::compute_draft       pure                               │
//! │  5. PayoutRepository::save_draft     one transaction, version CAS       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle Operations
//! Load the header, apply the transition from `payout_core::lifecycle`,
//! write it back with a compare-and-swap on `version`. Transitions that
//! were already applied (repeated confirmation, repeated cancel) skip the
//! write. Notifications go out after the write and never undo it.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use payout_core::validation;
use payout_core::{
    commission, compute_draft, render_csv, Adjustment, CommissionRule, CoreError, CoreResult,
    Currency, DraftPayout, DraftRequest, NewAdjustment, NewSale, Partner, Payout, PayoutLineItem,
    PayoutStatus, Period, PeriodCadence, Sale, TransitionOutcome, ValidationError,
};
use payout_db::{Database, PayoutFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SettlementConfig;
use crate::error::{SettlementError, SettlementResult};
use crate::locks::PeriodLocks;
use crate::notify::LogNotificationSink;
use crate::ports::{BookingSource, NotificationSink, PartnerConfigSource, PayoutEvent, TransferProvider};
use crate::sources::{DbBookingSource, DbPartnerConfigSource};
use crate::transfer::{initiate_with_retry, InitiationResult, RetryPolicy};

/// Current time at the precision timestamps are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// Input for registering or updating a partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartner {
    pub id: String,
    pub business_name: String,
    /// Defaults to the configured settlement currency.
    #[serde(default)]
    pub currency: Option<Currency>,
    pub payout_destination: String,
}

/// A payout header with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutDetail {
    pub payout: Payout,
    pub line_items: Vec<PayoutLineItem>,
}

/// Result of [`SettlementService::initiate_transfer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// The provider accepted the transfer; confirmation is pending.
    Initiated { payout: Payout, reference: String },
    /// A reference was already bound; the provider was not called.
    AlreadyInitiated { payout: Payout, reference: String },
    /// The provider declined; the payout is now failed.
    Declined { payout: Payout },
}

// =============================================================================
// Service
// =============================================================================

/// Settlement operations over the store and the collaborator ports.
pub struct SettlementService {
    db: Database,
    bookings: Arc<dyn BookingSource>,
    partners: Arc<dyn PartnerConfigSource>,
    transfers: Arc<dyn TransferProvider>,
    notifier: Arc<dyn NotificationSink>,
    locks: PeriodLocks,
    retry: RetryPolicy,
    cadence: PeriodCadence,
    default_currency: Currency,
}

impl SettlementService {
    /// Creates a service with SQLite-backed sources and a logging notifier.
    pub fn new(db: Database, config: &SettlementConfig, transfers: Arc<dyn TransferProvider>) -> Self {
        SettlementService {
            bookings: Arc::new(DbBookingSource::new(&db)),
            partners: Arc::new(DbPartnerConfigSource::new(&db)),
            notifier: Arc::new(LogNotificationSink),
            transfers,
            locks: PeriodLocks::new(),
            retry: config.retry_policy(),
            cadence: config.settlement.cadence,
            default_currency: config.settlement.default_currency,
            db,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_booking_source(mut self, bookings: Arc<dyn BookingSource>) -> Self {
        self.bookings = bookings;
        self
    }

    pub fn with_partner_source(mut self, partners: Arc<dyn PartnerConfigSource>) -> Self {
        self.partners = partners;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn locks(&self) -> &PeriodLocks {
        &self.locks
    }

    pub fn cadence(&self) -> PeriodCadence {
        self.cadence
    }

    // =========================================================================
    // Partners, Rules, Sales, Adjustments
    // =========================================================================

    /// Registers a partner or updates its name and destination.
    ///
    /// The settlement currency of an existing partner cannot change.
    pub async fn register_partner(&self, input: NewPartner) -> SettlementResult<Partner> {
        validation::validate_identifier("id", &input.id).map_err(CoreError::from)?;
        validation::validate_identifier("payout_destination", &input.payout_destination)
            .map_err(CoreError::from)?;
        if input.business_name.trim().is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "business_name".into(),
            })
            .into());
        }

        let currency = input.currency.unwrap_or(self.default_currency);
        if let Some(existing) = self.db.partners().get(&input.id).await? {
            if existing.currency != currency {
                return Err(CoreError::CurrencyMismatch {
                    left: existing.currency,
                    right: currency,
                }
                .into());
            }
        }

        let partner = Partner {
            id: input.id,
            business_name: input.business_name.trim().to_string(),
            currency,
            payout_destination: input.payout_destination,
            created_at: now(),
        };
        self.db.partners().upsert(&partner).await?;
        info!(partner_id = %partner.id, currency = %partner.currency, "Partner registered");

        self.partners.partner(&partner.id).await
    }

    pub async fn partner(&self, partner_id: &str) -> SettlementResult<Partner> {
        self.partners.partner(partner_id).await
    }

    /// Adds a commission rule version for a partner.
    pub async fn add_rule(&self, rule: CommissionRule) -> SettlementResult<CommissionRule> {
        rule.validate()?;
        self.partners.partner(&rule.partner_id).await?;
        self.db.rules().insert(&rule).await?;
        info!(
            partner_id = %rule.partner_id,
            model = rule.model.as_str(),
            rate = %rule.rate,
            effective_from = %rule.effective_from,
            "Commission rule added"
        );
        Ok(rule)
    }

    /// Records a settleable sale in the partner's currency.
    pub async fn record_sale(&self, sale: NewSale) -> SettlementResult<Sale> {
        sale.validate()?;
        let partner = self.partners.partner(&sale.partner_id).await?;
        ensure_currency(partner.currency, sale.gross_amount.currency())?;
        Ok(self.db.sales().record(sale).await?)
    }

    /// Appends a pending adjustment in the partner's currency.
    ///
    /// An effective date inside a finalized, paid or failed payout moves to
    /// the start of the next period no such payout covers.
    pub async fn record_adjustment(&self, adjustment: NewAdjustment) -> SettlementResult<Adjustment> {
        self.append_adjustment(adjustment, None).await
    }

    /// Compensates a sale with an adjustment of minus its net amount.
    ///
    /// The sale itself never changes. The adjustment is effective at
    /// `reversed_at`, or at the start of the next open period when a closed
    /// payout already covers that date. A sale can be reversed once.
    pub async fn reverse_sale(
        &self,
        sale_id: &str,
        reversed_at: DateTime<Utc>,
        reason: &str,
    ) -> SettlementResult<Adjustment> {
        validation::validate_reason(reason).map_err(CoreError::from)?;
        let sale = self
            .db
            .sales()
            .get(sale_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Sale", sale_id))?;

        let rule = self
            .partners
            .commission_rule_effective_at(&sale.partner_id, sale.occurred_at)
            .await?;
        let valued = commission(&sale, &rule)?;
        let amount = valued.net_of(sale.gross_amount)?.negate()?;

        let adjustment = NewAdjustment {
            partner_id: sale.partner_id.clone(),
            amount,
            reason: format!("reversal of sale {}: {reason}", sale.id),
            effective_date: reversed_at,
        };
        match self.append_adjustment(adjustment, Some(sale.id.as_str())).await {
            Err(SettlementError::Db(e)) if e.is_unique_violation() => {
                let duplicate = ValidationError::Duplicate {
                    field: "reversal".into(),
                    value: sale.id.clone(),
                };
                Err(CoreError::from(duplicate).into())
            }
            other => other,
        }
    }

    async fn append_adjustment(
        &self,
        mut adjustment: NewAdjustment,
        reversed_sale_id: Option<&str>,
    ) -> SettlementResult<Adjustment> {
        adjustment.validate()?;
        let partner = self.partners.partner(&adjustment.partner_id).await?;
        ensure_currency(partner.currency, adjustment.amount.currency())?;

        let requested = adjustment.effective_date;
        adjustment.effective_date = self.open_effective_date(&partner.id, requested).await?;
        if adjustment.effective_date != requested {
            info!(
                partner_id = %partner.id,
                requested = %requested,
                effective = %adjustment.effective_date,
                "Adjustment moved past closed payout"
            );
        }

        let stored = match reversed_sale_id {
            Some(sale_id) => self.db.adjustments().append_reversal(adjustment, sale_id).await?,
            None => self.db.adjustments().append(adjustment).await?,
        };
        info!(
            adjustment_id = %stored.id,
            partner_id = %stored.partner_id,
            amount = %stored.amount,
            effective_date = %stored.effective_date,
            "Adjustment recorded"
        );
        Ok(stored)
    }

    /// First instant at or after `at` that no finalized, paid or failed
    /// payout of the partner covers. Adjustments dated there are claimable
    /// by a later draft.
    async fn open_effective_date(&self, partner_id: &str, at: DateTime<Utc>) -> SettlementResult<DateTime<Utc>> {
        let mut effective = at;
        loop {
            let instant = Period::new(effective, effective + Duration::microseconds(1))?;
            let closed_until = self
                .db
                .payouts()
                .active_overlapping(partner_id, &instant)
                .await?
                .into_iter()
                .filter(|p| p.status != PayoutStatus::Draft)
                .map(|p| p.period.end)
                .max();
            match closed_until {
                Some(end) => effective = end,
                None => return Ok(effective),
            }
        }
    }

    // =========================================================================
    // Draft Computation
    // =========================================================================

    /// Computes and persists the draft payout for a partner and period,
    /// replacing any prior draft for that period wholesale.
    pub async fn compute_draft(&self, partner_id: &str, period: Period) -> SettlementResult<DraftPayout> {
        let _guard = self
            .locks
            .try_acquire(partner_id, period.start)
            .await
            .ok_or_else(|| CoreError::ConcurrentModification {
                entity: "Settlement period".into(),
                id: format!("{partner_id}@{}", period.start.format("%Y-%m-%d")),
            })?;

        let partner = self.partners.partner(partner_id).await?;
        let existing = self.db.payouts().active_overlapping(partner_id, &period).await?;
        let claimant = existing
            .iter()
            .find(|p| p.period == period && p.status == PayoutStatus::Draft)
            .map(|p| p.id.clone());

        let sales = self
            .bookings
            .list_settleable_sales(partner_id, &period, claimant.as_deref())
            .await?;
        let adjustments = self
            .db
            .adjustments()
            .claimable_for(partner_id, &period, claimant.as_deref())
            .await?;
        let rules = self.partners.rule_schedule(partner_id).await?;

        let mut draft = compute_draft(&DraftRequest {
            partner_id,
            period,
            currency: partner.currency,
            sales: &sales,
            adjustments: &adjustments,
            rules: &rules,
            existing: &existing,
            now: now(),
        })?;

        draft.payout = self.db.payouts().save_draft(&draft).await?;

        info!(
            partner_id,
            payout_id = %draft.payout.id,
            period = %period,
            line_items = draft.payout.line_item_count,
            net_total = %draft.payout.net_total,
            recomputed = draft.is_recomputation(),
            "Draft payout computed"
        );

        Ok(draft)
    }

    /// Recomputes an existing draft in place.
    pub async fn recompute(&self, payout_id: &str) -> SettlementResult<DraftPayout> {
        let payout = self.load(payout_id).await?;
        payout.ensure_recomputable()?;
        self.compute_draft(&payout.partner_id, payout.period).await
    }

    /// Partners with unsettled sales or pending adjustments in `period`.
    pub async fn partners_with_unsettled_activity(&self, period: &Period) -> SettlementResult<Vec<String>> {
        let mut partners: BTreeSet<String> = self
            .db
            .sales()
            .partners_with_unsettled_sales(period)
            .await?
            .into_iter()
            .collect();
        partners.extend(self.db.adjustments().partners_with_pending(period).await?);
        Ok(partners.into_iter().collect())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// `draft → finalized`; notifies the partner that a payout is available.
    pub async fn finalize(&self, payout_id: &str) -> SettlementResult<Payout> {
        let (payout, outcome) = self.transition(payout_id, |p| p.finalize(now())).await?;
        if outcome == TransitionOutcome::Applied {
            self.notify(&payout, PayoutEvent::Available).await;
        }
        Ok(payout)
    }

    /// `finalized → paid`. Repeating the call with the same reference is a
    /// no-op success.
    pub async fn mark_paid(&self, payout_id: &str, transfer_reference: &str) -> SettlementResult<Payout> {
        let (payout, outcome) = self
            .transition(payout_id, |p| p.mark_paid(transfer_reference, now()))
            .await?;
        if outcome == TransitionOutcome::Applied {
            self.notify(&payout, PayoutEvent::Paid).await;
        }
        Ok(payout)
    }

    /// `finalized → failed`, keeping the reason for audit.
    pub async fn mark_failed(&self, payout_id: &str, reason: &str) -> SettlementResult<Payout> {
        let (payout, outcome) = self
            .transition(payout_id, |p| p.mark_failed(reason, now()))
            .await?;
        if outcome == TransitionOutcome::Applied {
            self.notify(&payout, PayoutEvent::Failed).await;
        }
        Ok(payout)
    }

    /// `failed → draft`, permitting a fresh computation.
    pub async fn reopen(&self, payout_id: &str) -> SettlementResult<Payout> {
        let (payout, _) = self.transition(payout_id, |p| p.reopen()).await?;
        Ok(payout)
    }

    /// `draft → cancelled`. Claimed sales and adjustments are released in
    /// the same transaction; line items stay for audit.
    pub async fn cancel(&self, payout_id: &str) -> SettlementResult<Payout> {
        let (payout, _) = self.transition(payout_id, |p| p.cancel(now())).await?;
        Ok(payout)
    }

    // =========================================================================
    // Queries and Export
    // =========================================================================

    pub async fn get(&self, payout_id: &str) -> SettlementResult<PayoutDetail> {
        let payout = self.load(payout_id).await?;
        let line_items = self.db.payouts().line_items(payout_id).await?;
        Ok(PayoutDetail { payout, line_items })
    }

    pub async fn list(&self, filter: &PayoutFilter) -> SettlementResult<Vec<Payout>> {
        Ok(self.db.payouts().list(filter).await?)
    }

    /// Deterministic CSV snapshot of payouts in `status`.
    pub async fn export_csv(&self, status: PayoutStatus) -> SettlementResult<String> {
        let rows = self.db.payouts().export_rows(status).await?;
        debug!(status = %status, rows = rows.len(), "Rendering payout export");
        Ok(render_csv(rows)?)
    }

    /// Finalized payouts awaiting transfer, for manual initiation.
    pub async fn export_pending_csv(&self) -> SettlementResult<String> {
        self.export_csv(PayoutStatus::Finalized).await
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Starts the funds transfer of a finalized payout.
    ///
    /// ## Outcomes
    /// ```text
    /// provider Ok(reference)     → reference stored, payout stays finalized
    /// provider Declined(reason)  → mark_failed(reason)
    /// Network × max_attempts     → Err(TransferExhausted), payout untouched
    /// ```
    ///
    /// Calls for the same payout run one at a time, so the provider is
    /// reached at most once per payout.
    pub async fn initiate_transfer(&self, payout_id: &str) -> SettlementResult<TransferOutcome> {
        let _guard = self.locks.acquire_transfer(payout_id).await;
        let payout = self.load(payout_id).await?;
        if payout.status != PayoutStatus::Finalized {
            return Err(CoreError::InvalidTransition {
                payout_id: payout.id.clone(),
                from: payout.status,
                to: PayoutStatus::Paid,
            }
            .into());
        }
        if let Some(reference) = payout.transfer_reference.clone() {
            return Ok(TransferOutcome::AlreadyInitiated { payout, reference });
        }
        if !payout.net_total.is_positive() {
            return Err(CoreError::from(ValidationError::OutOfRange {
                field: "net_total".into(),
                min: 1,
                max: i64::MAX,
            })
            .into());
        }

        let partner = self.partners.partner(&payout.partner_id).await?;

        match initiate_with_retry(
            self.transfers.as_ref(),
            &self.retry,
            &payout.id,
            payout.net_total,
            &partner.payout_destination,
        )
        .await
        {
            InitiationResult::Initiated { reference, .. } => {
                let (payout, _) = self
                    .transition(payout_id, |p| p.record_transfer_reference(&reference))
                    .await?;
                Ok(TransferOutcome::Initiated { payout, reference })
            }
            InitiationResult::Declined { reason, .. } => {
                let payout = self.mark_failed(payout_id, &reason).await?;
                Ok(TransferOutcome::Declined { payout })
            }
            InitiationResult::Exhausted { last_error, attempts } => {
                Err(SettlementError::TransferExhausted {
                    payout_id: payout.id,
                    attempts,
                    last_error,
                })
            }
        }
    }

    /// Provider confirmation callback. Safe to deliver more than once.
    pub async fn on_transfer_confirmed(&self, transfer_reference: &str) -> SettlementResult<Payout> {
        let payout = self.by_reference(transfer_reference).await?;
        self.mark_paid(&payout.id, transfer_reference).await
    }

    /// Provider decline callback.
    pub async fn on_transfer_declined(&self, transfer_reference: &str, reason: &str) -> SettlementResult<Payout> {
        let payout = self.by_reference(transfer_reference).await?;
        self.mark_failed(&payout.id, reason).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load(&self, payout_id: &str) -> SettlementResult<Payout> {
        self.db
            .payouts()
            .get(payout_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Payout", payout_id))
    }

    async fn by_reference(&self, transfer_reference: &str) -> SettlementResult<Payout> {
        self.db
            .payouts()
            .find_by_transfer_reference(transfer_reference)
            .await?
            .ok_or_else(|| SettlementError::not_found("Transfer", transfer_reference))
    }

    /// Loads a payout, applies `apply`, and writes the result back if the
    /// stored version is unchanged.
    async fn transition<F>(&self, payout_id: &str, apply: F) -> SettlementResult<(Payout, TransitionOutcome)>
    where
        F: FnOnce(&mut Payout) -> CoreResult<TransitionOutcome>,
    {
        let mut payout = self.load(payout_id).await?;
        let expected = payout.version;
        let from = payout.status;

        let outcome = apply(&mut payout)?;
        if outcome == TransitionOutcome::AlreadyApplied {
            debug!(payout_id, status = %payout.status, "Transition already applied");
            return Ok((payout, outcome));
        }

        let stored = self.db.payouts().update_lifecycle(&payout, expected).await?;
        info!(
            payout_id,
            partner_id = %stored.partner_id,
            from = %from,
            to = %stored.status,
            "Payout transition applied"
        );
        Ok((stored, outcome))
    }

    async fn notify(&self, payout: &Payout, event: PayoutEvent) {
        let payload = json!({
            "payout_id": payout.id,
            "period_start": payout.period.start,
            "period_end": payout.period.end,
            "net_total": payout.net_total.to_decimal_string(),
            "currency": payout.currency,
            "transfer_reference": payout.transfer_reference,
            "failure_reason": payout.failure_reason,
        });
        if let Err(e) = self.notifier.notify(&payout.partner_id, event, payload).await {
            warn!(
                payout_id = %payout.id,
                partner_id = %payout.partner_id,
                event = %event,
                error = %e,
                "Notification failed"
            );
        }
    }
}

fn ensure_currency(expected: Currency, actual: Currency) -> CoreResult<()> {
    if expected != actual {
        return Err(CoreError::CurrencyMismatch {
            left: expected,
            right: actual,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
