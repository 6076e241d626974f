//! # Adjustment Repository
//!
//! The append-only adjustment ledger. Rows are never deleted; the only
//! mutable column is `consumed_by_payout_id`, written by the payout
//! repository in the same transaction as the draft it belongs to.

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::{decode_currency, decode_money, encode_ts};
use crate::error::{DbError, DbResult};
use payout_core::{Adjustment, NewAdjustment, Period};

/// Row shape of the `adjustments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdjustmentRecord {
    pub id: String,
    pub partner_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub reason: String,
    pub effective_date: DateTime<Utc>,
    pub consumed_by_payout_id: Option<String>,
    pub reversed_sale_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AdjustmentRecord> for Adjustment {
    type Error = DbError;

    fn try_from(record: AdjustmentRecord) -> Result<Self, Self::Error> {
        let currency = decode_currency(&record.currency)?;
        Ok(Adjustment {
            id: record.id,
            partner_id: record.partner_id,
            amount: decode_money(record.amount_minor, currency),
            reason: record.reason,
            effective_date: record.effective_date,
            consumed_by_payout_id: record.consumed_by_payout_id,
            reversed_sale_id: record.reversed_sale_id,
            created_at: record.created_at,
        })
    }
}

const SELECT_ADJUSTMENT: &str = r#"
    SELECT id, partner_id, amount_minor, currency, reason, effective_date,
           consumed_by_payout_id, reversed_sale_id, created_at
    FROM adjustments
"#;

/// Repository for the adjustment ledger.
#[derive(Debug, Clone)]
pub struct AdjustmentRepository {
    pool: SqlitePool,
}

impl AdjustmentRepository {
    /// Creates a new AdjustmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AdjustmentRepository { pool }
    }

    /// Appends a pending adjustment.
    pub async fn append(&self, adjustment: NewAdjustment) -> DbResult<Adjustment> {
        self.insert(adjustment, None).await
    }

    /// Appends the compensating entry for `sale_id`.
    ///
    /// A second reversal of the same sale fails with
    /// [`DbError::UniqueViolation`] on `adjustments.reversed_sale_id`.
    pub async fn append_reversal(&self, adjustment: NewAdjustment, sale_id: &str) -> DbResult<Adjustment> {
        self.insert(adjustment, Some(sale_id.to_string())).await
    }

    async fn insert(&self, adjustment: NewAdjustment, reversed_sale_id: Option<String>) -> DbResult<Adjustment> {
        let stored = Adjustment {
            id: Uuid::new_v4().to_string(),
            partner_id: adjustment.partner_id,
            amount: adjustment.amount,
            reason: adjustment.reason,
            effective_date: adjustment.effective_date,
            consumed_by_payout_id: None,
            reversed_sale_id,
            // Stored at microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
        };

        sqlx::query(
            r#"
            INSERT INTO adjustments (
                id, partner_id, amount_minor, currency, reason, effective_date,
                consumed_by_payout_id, reversed_sale_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.partner_id)
        .bind(stored.amount.minor_units())
        .bind(stored.amount.currency().as_str())
        .bind(&stored.reason)
        .bind(encode_ts(&stored.effective_date))
        .bind(&stored.reversed_sale_id)
        .bind(encode_ts(&stored.created_at))
        .execute(&self.pool)
        .await?;

        debug!(
            adjustment_id = %stored.id,
            partner_id = %stored.partner_id,
            amount = %stored.amount,
            reversed_sale_id = ?stored.reversed_sale_id,
            "Adjustment appended"
        );

        Ok(stored)
    }

    /// Gets an adjustment by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Adjustment>> {
        let record = sqlx::query_as::<_, AdjustmentRecord>(&format!(
            "{SELECT_ADJUSTMENT} WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Adjustment::try_from).transpose()
    }

    /// Adjustments effective in `period` that `payout_id` may claim:
    /// pending ones plus those it already holds.
    pub async fn claimable_for(
        &self,
        partner_id: &str,
        period: &Period,
        payout_id: Option<&str>,
    ) -> DbResult<Vec<Adjustment>> {
        let records = sqlx::query_as::<_, AdjustmentRecord>(&format!(
            r#"{SELECT_ADJUSTMENT}
            WHERE partner_id = ?1
              AND effective_date >= ?2
              AND effective_date < ?3
              AND (consumed_by_payout_id IS NULL OR consumed_by_payout_id = ?4)
            ORDER BY effective_date, id
            "#
        ))
        .bind(partner_id)
        .bind(encode_ts(&period.start))
        .bind(encode_ts(&period.end))
        .bind(payout_id.unwrap_or(""))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Adjustment::try_from).collect()
    }

    /// Partners with pending adjustments effective in `period`.
    pub async fn partners_with_pending(&self, period: &Period) -> DbResult<Vec<String>> {
        let partners: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT partner_id
            FROM adjustments
            WHERE consumed_by_payout_id IS NULL
              AND effective_date >= ?1
              AND effective_date < ?2
            ORDER BY partner_id
            "#,
        )
        .bind(encode_ts(&period.start))
        .bind(encode_ts(&period.end))
        .fetch_all(&self.pool)
        .await?;

        Ok(partners)
    }
}
