//! # Commission Rule Repository
//!
//! Versioned commission rules. Rules are append-only: a change of terms is
//! a new row with a later `effective_from`, so older sales keep the terms
//! they were sold under.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::encode_ts;
use crate::error::{DbError, DbResult};
use payout_core::{CommissionModel, CommissionRule, Percentage, RuleSchedule};

/// Row shape of the `commission_rules` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RuleRecord {
    pub id: String,
    pub partner_id: String,
    pub model: CommissionModel,
    pub rate_bps: i64,
    pub repeat_rate_bps: Option<i64>,
    pub tax_rate_bps: i64,
    pub effective_from: DateTime<Utc>,
}

fn decode_bps(field: &str, bps: i64) -> DbResult<Percentage> {
    u32::try_from(bps)
        .map(Percentage::from_bps)
        .map_err(|e| DbError::corrupt(field, e))
}

impl TryFrom<RuleRecord> for CommissionRule {
    type Error = DbError;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        Ok(CommissionRule {
            rate: decode_bps("rate_bps", record.rate_bps)?,
            repeat_rate: record
                .repeat_rate_bps
                .map(|bps| decode_bps("repeat_rate_bps", bps))
                .transpose()?,
            tax_rate_on_commission: decode_bps("tax_rate_bps", record.tax_rate_bps)?,
            id: record.id,
            partner_id: record.partner_id,
            model: record.model,
            effective_from: record.effective_from,
        })
    }
}

const SELECT_RULE: &str = r#"
    SELECT id, partner_id, model, rate_bps, repeat_rate_bps, tax_rate_bps, effective_from
    FROM commission_rules
"#;

/// Repository for commission rule operations.
#[derive(Debug, Clone)]
pub struct RuleRepository {
    pool: SqlitePool,
}

impl RuleRepository {
    /// Creates a new RuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RuleRepository { pool }
    }

    /// Inserts a rule. Callers validate the rule shape first; the table's
    /// CHECK constraints reject anything that slips through.
    pub async fn insert(&self, rule: &CommissionRule) -> DbResult<()> {
        debug!(
            partner_id = %rule.partner_id,
            model = rule.model.as_str(),
            effective_from = %rule.effective_from,
            "Inserting commission rule"
        );

        sqlx::query(
            r#"
            INSERT INTO commission_rules (
                id, partner_id, model, rate_bps, repeat_rate_bps, tax_rate_bps,
                effective_from, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.partner_id)
        .bind(rule.model)
        .bind(rule.rate.bps() as i64)
        .bind(rule.repeat_rate.map(|r| r.bps() as i64))
        .bind(rule.tax_rate_on_commission.bps() as i64)
        .bind(encode_ts(&rule.effective_from))
        .bind(encode_ts(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads every rule of a partner as a schedule.
    pub async fn schedule_for(&self, partner_id: &str) -> DbResult<RuleSchedule> {
        let records = sqlx::query_as::<_, RuleRecord>(&format!(
            "{SELECT_RULE} WHERE partner_id = ?1 ORDER BY effective_from"
        ))
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;

        let rules = records
            .into_iter()
            .map(CommissionRule::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        RuleSchedule::new(rules).map_err(|e| DbError::corrupt("commission_rules", e))
    }

    /// Returns the rule in force for a partner at `at`.
    pub async fn effective_at(
        &self,
        partner_id: &str,
        at: &DateTime<Utc>,
    ) -> DbResult<Option<CommissionRule>> {
        let record = sqlx::query_as::<_, RuleRecord>(&format!(
            "{SELECT_RULE} WHERE partner_id = ?1 AND effective_from <= ?2 \
             ORDER BY effective_from DESC LIMIT 1"
        ))
        .bind(partner_id)
        .bind(encode_ts(at))
        .fetch_optional(&self.pool)
        .await?;

        record.map(CommissionRule::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{db_with_partner, PARTNER};
    use super::*;
    use chrono::TimeZone;

    fn day(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, m, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_roundtrip_and_lookup() {
        let db = db_with_partner().await;
        let flat = CommissionRule::flat(PARTNER, Percentage::from_percent(15), Percentage::from_percent(20), day(1));
        let acquisition = CommissionRule::acquisition(
            PARTNER,
            Percentage::from_percent(20),
            Percentage::from_percent(10),
            Percentage::zero(),
            day(7),
        );
        db.rules().insert(&acquisition).await.unwrap();
        db.rules().insert(&flat).await.unwrap();

        let schedule = db.rules().schedule_for(PARTNER).await.unwrap();
        assert_eq!(schedule.rules().len(), 2);
        assert_eq!(schedule.rules()[0], flat);
        assert_eq!(schedule.rules()[1], acquisition);

        let june = Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(db.rules().effective_at(PARTNER, &june).await.unwrap().unwrap().id, flat.id);
        assert_eq!(db.rules().effective_at(PARTNER, &day(7)).await.unwrap().unwrap().id, acquisition.id);
        let before = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(db.rules().effective_at(PARTNER, &before).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_effective_date_rejected() {
        let db = db_with_partner().await;
        let a = CommissionRule::flat(PARTNER, Percentage::from_percent(15), Percentage::zero(), day(1));
        let b = CommissionRule::flat(PARTNER, Percentage::from_percent(10), Percentage::zero(), day(1));
        db.rules().insert(&a).await.unwrap();
        assert!(db.rules().insert(&b).await.unwrap_err().is_unique_violation());
    }

    #[tokio::test]
    async fn test_malformed_rule_rejected_by_store() {
        let db = db_with_partner().await;
        let mut bad = CommissionRule::flat(PARTNER, Percentage::from_percent(15), Percentage::zero(), day(1));
        bad.repeat_rate = Some(Percentage::from_percent(5));
        assert!(db.rules().insert(&bad).await.is_err());
    }
}
