//! # Settlement Driver
//!
//! Batch draft computation for every partner with unsettled activity.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Settlement Batch Run                              │
//! │                                                                         │
//! │  reference time ──► prior period (cadence)                              │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  partners_with_unsettled_activity(period)                               │
//! │                          │                                              │
//! │        ┌─────────────────┼─────────────────┐   buffer_unordered(N)      │
//! │        ▼                 ▼                 ▼                            │
//! │  compute_draft(p1)  compute_draft(p2)  compute_draft(p3)                │
//! │        │                 │                 │                            │
//! │     Drafted           Failed            Skipped                         │
//! │        └─────────────────┴─────────────────┘                            │
//! │                          ▼                                              │
//! │                BatchReport (sorted by partner)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One partner's failure never aborts the others. Cancellation stops new
//! partners from starting; partners already in flight finish.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use payout_core::{CoreError, Money, Period};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{SettlementError, SettlementResult};
use crate::service::SettlementService;

// =============================================================================
// Report
// =============================================================================

/// Outcome for one partner in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PartnerResult {
    Drafted {
        payout_id: String,
        net_total: Money,
        line_items: u32,
    },
    Failed {
        error: String,
    },
    /// Nothing to do: the period is already finalized, or the run was
    /// cancelled before this partner started.
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerOutcome {
    pub partner_id: String,
    #[serde(flatten)]
    pub result: PartnerResult,
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub period: Period,
    pub outcomes: Vec<PartnerOutcome>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn drafted(&self) -> usize {
        self.count(|r| matches!(r, PartnerResult::Drafted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, PartnerResult::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|r| matches!(r, PartnerResult::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&PartnerResult) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.result)).count()
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Runs draft computation over all partners of a period.
#[derive(Clone)]
pub struct SettlementDriver {
    service: Arc<SettlementService>,
    concurrency: usize,
}

impl SettlementDriver {
    pub fn new(service: Arc<SettlementService>, concurrency: usize) -> Self {
        SettlementDriver {
            service,
            concurrency: concurrency.max(1),
        }
    }

    /// Settles the period before the one containing `reference`.
    pub async fn run_batch(
        &self,
        reference: DateTime<Utc>,
        cancel: watch::Receiver<bool>,
    ) -> SettlementResult<BatchReport> {
        let cadence = self.service.cadence();
        let period = Period::containing(cadence, reference)?.previous(cadence)?;
        self.run_period(period, cancel).await
    }

    /// Computes drafts for every partner with unsettled activity in `period`.
    pub async fn run_period(
        &self,
        period: Period,
        cancel: watch::Receiver<bool>,
    ) -> SettlementResult<BatchReport> {
        let partners = self.service.partners_with_unsettled_activity(&period).await?;
        info!(
            period = %period,
            partners = partners.len(),
            concurrency = self.concurrency,
            "Settlement batch started"
        );

        let mut outcomes: Vec<PartnerOutcome> = stream::iter(partners)
            .map(|partner_id| {
                let cancel = cancel.clone();
                async move {
                    let cancelled = *cancel.borrow();
                    if cancelled {
                        return PartnerOutcome {
                            partner_id,
                            result: PartnerResult::Skipped {
                                reason: "batch cancelled".into(),
                            },
                        };
                    }
                    let result = self.settle_partner(&partner_id, period).await;
                    PartnerOutcome { partner_id, result }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        outcomes.sort_by(|a, b| a.partner_id.cmp(&b.partner_id));
        let report = BatchReport {
            period,
            cancelled: *cancel.borrow(),
            outcomes,
        };

        info!(
            period = %period,
            drafted = report.drafted(),
            failed = report.failed(),
            skipped = report.skipped(),
            cancelled = report.cancelled,
            "Settlement batch finished"
        );
        Ok(report)
    }

    async fn settle_partner(&self, partner_id: &str, period: Period) -> PartnerResult {
        match self.service.compute_draft(partner_id, period).await {
            Ok(draft) => PartnerResult::Drafted {
                payout_id: draft.payout.id,
                net_total: draft.payout.net_total,
                line_items: draft.payout.line_item_count,
            },
            Err(SettlementError::Core(CoreError::Immutable { payout_id, status })) => {
                PartnerResult::Skipped {
                    reason: format!("payout {payout_id} is {status}"),
                }
            }
            Err(e) => {
                warn!(partner_id, period = %period, error = %e, "Draft computation failed");
                PartnerResult::Failed { error: e.to_string() }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{add_partner, eur, sell, sep, september, service, PARTNER};
    use chrono::TimeZone;
    use payout_core::{NewSale, Percentage, SaleEligibility};

    fn idle() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn test_batch_targets_prior_period() {
        let service = Arc::new(service().await);
        add_partner(&service, "partner-2", Percentage::zero()).await;
        sell(&service, PARTNER, 10_000, sep(5)).await;
        sell(&service, "partner-2", 2_000, sep(25)).await;

        let driver = SettlementDriver::new(service.clone(), 2);
        let reference = Utc.with_ymd_and_hms(2026, 10, 1, 2, 0, 0).unwrap();
        let report = driver.run_batch(reference, idle()).await.unwrap();

        assert_eq!(report.period, september());
        assert!(!report.cancelled);
        assert_eq!(report.drafted(), 2);
        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.partner_id.as_str()).collect();
        assert_eq!(ids, vec![PARTNER, "partner-2"]);
        let PartnerResult::Drafted { net_total, .. } = &report.outcomes[0].result else {
            panic!("expected drafted payout");
        };
        assert_eq!(*net_total, eur(8_200));
    }

    #[tokio::test]
    async fn test_partner_failure_is_isolated() {
        let service = Arc::new(service().await);
        sell(&service, PARTNER, 10_000, sep(5)).await;

        // A partner with a sale but no commission rule
        service
            .register_partner(crate::service::NewPartner {
                id: "partner-norule".into(),
                business_name: "No Rule".into(),
                currency: None,
                payout_destination: "DE89370400440532013001".into(),
            })
            .await
            .unwrap();
        service
            .record_sale(NewSale {
                partner_id: "partner-norule".into(),
                buyer_id: "buyer-9".into(),
                gross_amount: eur(3_000),
                occurred_at: sep(7),
                eligibility: SaleEligibility::Confirmed,
            })
            .await
            .unwrap();

        let driver = SettlementDriver::new(service.clone(), 4);
        let report = driver.run_period(september(), idle()).await.unwrap();

        assert_eq!(report.drafted(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcomes[1].partner_id, "partner-norule");
        let PartnerResult::Failed { error } = &report.outcomes[1].result else {
            panic!("expected failure");
        };
        assert!(error.contains("No commission rule"));
    }

    #[tokio::test]
    async fn test_rerun_skips_settled_partners() {
        let service = Arc::new(service().await);
        sell(&service, PARTNER, 10_000, sep(5)).await;
        let driver = SettlementDriver::new(service.clone(), 1);

        let first = driver.run_period(september(), idle()).await.unwrap();
        let second = driver.run_period(september(), idle()).await.unwrap();
        // The sale is claimed by the draft, so the second run finds nothing
        assert_eq!(first.drafted(), 1);
        assert!(second.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_partners() {
        let service = Arc::new(service().await);
        sell(&service, PARTNER, 10_000, sep(5)).await;

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let driver = SettlementDriver::new(service.clone(), 1);
        let report = driver.run_period(september(), rx).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.skipped(), 1);
        assert!(service.list(&Default::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_serializes_flat() {
        let report = BatchReport {
            period: september(),
            cancelled: false,
            outcomes: vec![PartnerOutcome {
                partner_id: PARTNER.into(),
                result: PartnerResult::Skipped {
                    reason: "payout p-1 is finalized".into(),
                },
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["partner_id"], PARTNER);
        assert_eq!(json["outcomes"][0]["outcome"], "skipped");
    }
}
