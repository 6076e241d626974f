//! # Sale Repository (Booking Ledger)
//!
//! Records settleable sales and serves them back for settlement.
//!
//! ## Sale Recording
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(NewSale)                       one transaction                  │
//! │                                                                         │
//! │  1. INSERT sale (is_first = 0)     ──► sequence = AUTOINCREMENT rowid   │
//! │  2. SELECT earlier history for (partner, buyer)                         │
//! │  3. ledger::is_first_purchase(occurred_at, sequence, history)           │
//! │  4. UPDATE sale SET is_first = ?                                        │
//! │                                                                         │
//! │  The flag is never written again.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Settleable Query
//! Filters strictly on `occurred_at` and on settlement claims, never on a
//! mutable status, so a period queried twice yields the same sales.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{decode_currency, decode_money, encode_ts};
use crate::error::{DbError, DbResult};
use payout_core::ledger;
use payout_core::{NewSale, Period, Sale, SaleEligibility};

/// Row shape of the `sales` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleRecord {
    pub sequence: i64,
    pub id: String,
    pub partner_id: String,
    pub buyer_id: String,
    pub gross_amount_minor: i64,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
    pub eligibility: SaleEligibility,
    pub is_first_purchase_for_buyer: bool,
}

impl TryFrom<SaleRecord> for Sale {
    type Error = DbError;

    fn try_from(record: SaleRecord) -> Result<Self, Self::Error> {
        let currency = decode_currency(&record.currency)?;
        Ok(Sale {
            id: record.id,
            partner_id: record.partner_id,
            buyer_id: record.buyer_id,
            gross_amount: decode_money(record.gross_amount_minor, currency),
            occurred_at: record.occurred_at,
            eligibility: record.eligibility,
            is_first_purchase_for_buyer: record.is_first_purchase_for_buyer,
            sequence: record.sequence,
        })
    }
}

const SELECT_SALE: &str = r#"
    SELECT s.sequence, s.id, s.partner_id, s.buyer_id, s.gross_amount_minor, s.currency,
           s.occurred_at, s.eligibility, s.is_first_purchase_for_buyer
    FROM sales s
"#;

/// Repository for the booking ledger.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a settleable sale and derives its first-purchase flag.
    ///
    /// The caller validates the input (`NewSale::validate`) and checks the
    /// currency against the partner first.
    pub async fn record(&self, new_sale: NewSale) -> DbResult<Sale> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO sales (
                id, partner_id, buyer_id, gross_amount_minor, currency,
                occurred_at, eligibility, is_first_purchase_for_buyer, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)
            "#,
        )
        .bind(&id)
        .bind(&new_sale.partner_id)
        .bind(&new_sale.buyer_id)
        .bind(new_sale.gross_amount.minor_units())
        .bind(new_sale.gross_amount.currency().as_str())
        .bind(encode_ts(&new_sale.occurred_at))
        .bind(new_sale.eligibility)
        .bind(encode_ts(&now))
        .execute(&mut *tx)
        .await?;

        let sequence = inserted.last_insert_rowid();

        let history = sqlx::query_as::<_, SaleRecord>(&format!(
            "{SELECT_SALE} WHERE s.partner_id = ?1 AND s.buyer_id = ?2 \
             AND s.occurred_at <= ?3 AND s.sequence != ?4"
        ))
        .bind(&new_sale.partner_id)
        .bind(&new_sale.buyer_id)
        .bind(encode_ts(&new_sale.occurred_at))
        .bind(sequence)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Sale::try_from)
        .collect::<DbResult<Vec<_>>>()?;

        let is_first = ledger::is_first_purchase(new_sale.occurred_at, sequence, &history);

        sqlx::query("UPDATE sales SET is_first_purchase_for_buyer = ?1 WHERE sequence = ?2")
            .bind(is_first)
            .bind(sequence)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            sale_id = %id,
            partner_id = %new_sale.partner_id,
            sequence,
            is_first,
            "Sale recorded"
        );

        Ok(new_sale.into_sale(id, sequence, is_first))
    }

    /// Gets a sale by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let record = sqlx::query_as::<_, SaleRecord>(&format!("{SELECT_SALE} WHERE s.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Sale::try_from).transpose()
    }

    /// Lists a partner's settleable sales in `[start, end)`, ordered by
    /// `(occurred_at, sequence)`.
    ///
    /// Sales already claimed by another payout are excluded; sales claimed
    /// by `payout_id` (the draft being recomputed) are included.
    pub async fn list_settleable(
        &self,
        partner_id: &str,
        period: &Period,
        payout_id: Option<&str>,
    ) -> DbResult<Vec<Sale>> {
        let records = sqlx::query_as::<_, SaleRecord>(&format!(
            r#"{SELECT_SALE}
            WHERE s.partner_id = ?1
              AND s.occurred_at >= ?2
              AND s.occurred_at < ?3
              AND s.eligibility IN ('confirmed', 'paid')
              AND NOT EXISTS (
                  SELECT 1 FROM settled_sales ss
                  WHERE ss.sale_id = s.id AND ss.payout_id != ?4
              )
            ORDER BY s.occurred_at, s.sequence
            "#
        ))
        .bind(partner_id)
        .bind(encode_ts(&period.start))
        .bind(encode_ts(&period.end))
        .bind(payout_id.unwrap_or(""))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Sale::try_from).collect()
    }

    /// Partners with at least one unsettled sale in `[start, end)`.
    pub async fn partners_with_unsettled_sales(&self, period: &Period) -> DbResult<Vec<String>> {
        let partners: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT s.partner_id
            FROM sales s
            WHERE s.occurred_at >= ?1
              AND s.occurred_at < ?2
              AND NOT EXISTS (SELECT 1 FROM settled_sales ss WHERE ss.sale_id = s.id)
            ORDER BY s.partner_id
            "#,
        )
        .bind(encode_ts(&period.start))
        .bind(encode_ts(&period.end))
        .fetch_all(&self.pool)
        .await?;

        info!(count = partners.len(), period = %period, "Partners with unsettled sales");
        Ok(partners)
    }

    /// Returns the payout currently claiming a sale, if any.
    pub async fn settled_by(&self, sale_id: &str) -> DbResult<Option<String>> {
        let payout_id: Option<String> =
            sqlx::query_scalar("SELECT payout_id FROM settled_sales WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(payout_id)
    }
}
