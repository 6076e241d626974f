//! # SQLite-backed Sources
//!
//! [`BookingSource`] and [`PartnerConfigSource`] over the payout-db
//! repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payout_core::{CommissionRule, CoreError, Partner, Period, RuleSchedule, Sale};
use payout_db::{Database, PartnerRepository, RuleRepository, SaleRepository};

use crate::error::{SettlementError, SettlementResult};
use crate::ports::{BookingSource, PartnerConfigSource};

/// Booking ledger backed by the `sales` table.
#[derive(Debug, Clone)]
pub struct DbBookingSource {
    sales: SaleRepository,
}

impl DbBookingSource {
    pub fn new(db: &Database) -> Self {
        DbBookingSource { sales: db.sales() }
    }
}

#[async_trait]
impl BookingSource for DbBookingSource {
    async fn list_settleable_sales(
        &self,
        partner_id: &str,
        period: &Period,
        claimant: Option<&str>,
    ) -> SettlementResult<Vec<Sale>> {
        Ok(self.sales.list_settleable(partner_id, period, claimant).await?)
    }
}

/// Partner directory and rule versions backed by SQLite.
#[derive(Debug, Clone)]
pub struct DbPartnerConfigSource {
    partners: PartnerRepository,
    rules: RuleRepository,
}

impl DbPartnerConfigSource {
    pub fn new(db: &Database) -> Self {
        DbPartnerConfigSource {
            partners: db.partners(),
            rules: db.rules(),
        }
    }
}

#[async_trait]
impl PartnerConfigSource for DbPartnerConfigSource {
    async fn partner(&self, partner_id: &str) -> SettlementResult<Partner> {
        self.partners
            .get(partner_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Partner", partner_id))
    }

    async fn commission_rule_effective_at(
        &self,
        partner_id: &str,
        at: DateTime<Utc>,
    ) -> SettlementResult<CommissionRule> {
        self.rules
            .effective_at(partner_id, &at)
            .await?
            .ok_or_else(|| {
                CoreError::RuleMissing {
                    partner_id: partner_id.to_string(),
                    sale_id: None,
                    at,
                }
                .into()
            })
    }

    async fn rule_schedule(&self, partner_id: &str) -> SettlementResult<RuleSchedule> {
        Ok(self.rules.schedule_for(partner_id).await?)
    }
}
