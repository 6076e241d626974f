//! # Payout Repository
//!
//! Payout headers, line items and settlement claims.
//!
//! ## Draft Persistence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save_draft(DraftPayout)                  ONE transaction               │
//! │                                                                         │
//! │  1. Header   new:   INSERT (partial unique index guards the period)     │
//! │              again: UPDATE ... WHERE version = expected AND draft       │
//! │  2. Release  DELETE line items, DELETE settled_sales,                   │
//! │              UPDATE adjustments SET consumed_by = NULL                  │
//! │  3. Claim    INSERT line items, INSERT settled_sales (PK = sale_id),    │
//! │              UPDATE adjustments SET consumed_by = payout                │
//! │                                                                         │
//! │  Any conflict → StaleVersion, and the prior draft is untouched.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle Updates
//! `update_lifecycle` writes the status columns with a compare-and-swap on
//! `version`. Cancelling releases sale and adjustment claims in the same
//! transaction; line items stay for audit. Nothing here deletes a payout.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{decode_currency, decode_money, encode_opt_ts, encode_ts};
use crate::error::{DbError, DbResult};
use payout_core::{
    DraftPayout, ExportRow, LineItemKind, Payout, PayoutLineItem, PayoutStatus, Period,
};

// =============================================================================
// Records
// =============================================================================

/// Row shape of the `payouts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PayoutRecord {
    pub id: String,
    pub partner_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: PayoutStatus,
    pub currency: String,
    pub gross_total_minor: i64,
    pub commission_total_minor: i64,
    pub adjustment_total_minor: i64,
    pub net_total_minor: i64,
    pub line_item_count: i64,
    pub generated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub transfer_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub version: i64,
}

impl TryFrom<PayoutRecord> for Payout {
    type Error = DbError;

    fn try_from(record: PayoutRecord) -> Result<Self, Self::Error> {
        let currency = decode_currency(&record.currency)?;
        let period = Period::new(record.period_start, record.period_end)
            .map_err(|e| DbError::corrupt(format!("payout {}", record.id), e))?;
        let line_item_count = u32::try_from(record.line_item_count)
            .map_err(|e| DbError::corrupt("line_item_count", e))?;

        Ok(Payout {
            id: record.id,
            partner_id: record.partner_id,
            period,
            status: record.status,
            currency,
            gross_total: decode_money(record.gross_total_minor, currency),
            commission_total: decode_money(record.commission_total_minor, currency),
            adjustment_total: decode_money(record.adjustment_total_minor, currency),
            net_total: decode_money(record.net_total_minor, currency),
            line_item_count,
            generated_at: record.generated_at,
            finalized_at: record.finalized_at,
            paid_at: record.paid_at,
            failed_at: record.failed_at,
            cancelled_at: record.cancelled_at,
            transfer_reference: record.transfer_reference,
            failure_reason: record.failure_reason,
            version: record.version,
        })
    }
}

/// Row shape of the `payout_line_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineItemRecord {
    pub payout_id: String,
    pub position: i64,
    pub kind: LineItemKind,
    pub sale_id: Option<String>,
    pub adjustment_id: Option<String>,
    pub currency: String,
    pub gross_amount_minor: i64,
    pub commission_base_minor: i64,
    pub commission_tax_minor: i64,
    pub net_amount_minor: i64,
}

impl TryFrom<LineItemRecord> for PayoutLineItem {
    type Error = DbError;

    fn try_from(record: LineItemRecord) -> Result<Self, Self::Error> {
        let currency = decode_currency(&record.currency)?;
        Ok(PayoutLineItem {
            position: u32::try_from(record.position).map_err(|e| DbError::corrupt("position", e))?,
            payout_id: record.payout_id,
            kind: record.kind,
            sale_id: record.sale_id,
            adjustment_id: record.adjustment_id,
            gross_amount: decode_money(record.gross_amount_minor, currency),
            commission_base: decode_money(record.commission_base_minor, currency),
            commission_tax: decode_money(record.commission_tax_minor, currency),
            net_amount: decode_money(record.net_amount_minor, currency),
        })
    }
}

/// A payout joined with its partner's business name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExportRecord {
    #[sqlx(flatten)]
    pub payout: PayoutRecord,
    pub business_name: String,
}

/// Optional filters for [`PayoutRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct PayoutFilter {
    pub partner_id: Option<String>,
    pub status: Option<PayoutStatus>,
}

const PAYOUT_COLUMNS: &str = r#"
    p.id, p.partner_id, p.period_start, p.period_end, p.status, p.currency,
    p.gross_total_minor, p.commission_total_minor, p.adjustment_total_minor,
    p.net_total_minor, p.line_item_count, p.generated_at, p.finalized_at,
    p.paid_at, p.failed_at, p.cancelled_at, p.transfer_reference,
    p.failure_reason, p.version
"#;

// =============================================================================
// Transaction Steps
// =============================================================================

async fn insert_header(conn: &mut SqliteConnection, payout: &Payout, version: i64) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payouts (
            id, partner_id, period_start, period_end, status, currency,
            gross_total_minor, commission_total_minor, adjustment_total_minor,
            net_total_minor, line_item_count, generated_at, finalized_at,
            paid_at, failed_at, cancelled_at, transfer_reference, failure_reason, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
    )
    .bind(&payout.id)
    .bind(&payout.partner_id)
    .bind(encode_ts(&payout.period.start))
    .bind(encode_ts(&payout.period.end))
    .bind(payout.status)
    .bind(payout.currency.as_str())
    .bind(payout.gross_total.minor_units())
    .bind(payout.commission_total.minor_units())
    .bind(payout.adjustment_total.minor_units())
    .bind(payout.net_total.minor_units())
    .bind(payout.line_item_count as i64)
    .bind(encode_ts(&payout.generated_at))
    .bind(encode_opt_ts(&payout.finalized_at))
    .bind(encode_opt_ts(&payout.paid_at))
    .bind(encode_opt_ts(&payout.failed_at))
    .bind(encode_opt_ts(&payout.cancelled_at))
    .bind(&payout.transfer_reference)
    .bind(&payout.failure_reason)
    .bind(version)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn release_claims(conn: &mut SqliteConnection, payout_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM settled_sales WHERE payout_id = ?1")
        .bind(payout_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE adjustments SET consumed_by_payout_id = NULL WHERE consumed_by_payout_id = ?1")
        .bind(payout_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_line_item(conn: &mut SqliteConnection, line: &PayoutLineItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payout_line_items (
            payout_id, position, kind, sale_id, adjustment_id, currency,
            gross_amount_minor, commission_base_minor, commission_tax_minor, net_amount_minor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&line.payout_id)
    .bind(line.position as i64)
    .bind(line.kind)
    .bind(&line.sale_id)
    .bind(&line.adjustment_id)
    .bind(line.net_amount.currency().as_str())
    .bind(line.gross_amount.minor_units())
    .bind(line.commission_base.minor_units())
    .bind(line.commission_tax.minor_units())
    .bind(line.net_amount.minor_units())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Maps uniqueness conflicts inside a draft write to a stale version.
fn conflict_as_stale(payout_id: &str) -> impl Fn(DbError) -> DbError + '_ {
    move |err| {
        if err.is_unique_violation() {
            DbError::stale_payout(payout_id)
        } else {
            err
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for payout headers and line items.
#[derive(Debug, Clone)]
pub struct PayoutRepository {
    pool: SqlitePool,
}

impl PayoutRepository {
    /// Creates a new PayoutRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PayoutRepository { pool }
    }

    /// Gets a payout header by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Payout>> {
        let record = sqlx::query_as::<_, PayoutRecord>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts p WHERE p.id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Payout::try_from).transpose()
    }

    /// Gets the line items of a payout in position order.
    pub async fn line_items(&self, payout_id: &str) -> DbResult<Vec<PayoutLineItem>> {
        let records = sqlx::query_as::<_, LineItemRecord>(
            r#"
            SELECT payout_id, position, kind, sale_id, adjustment_id, currency,
                   gross_amount_minor, commission_base_minor, commission_tax_minor,
                   net_amount_minor
            FROM payout_line_items
            WHERE payout_id = ?1
            ORDER BY position
            "#,
        )
        .bind(payout_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(PayoutLineItem::try_from).collect()
    }

    /// Lists payouts, optionally filtered, in `(period_start, partner_id, id)`
    /// order.
    pub async fn list(&self, filter: &PayoutFilter) -> DbResult<Vec<Payout>> {
        let records = sqlx::query_as::<_, PayoutRecord>(&format!(
            r#"SELECT {PAYOUT_COLUMNS} FROM payouts p
            WHERE (?1 IS NULL OR p.partner_id = ?1)
              AND (?2 IS NULL OR p.status = ?2)
            ORDER BY p.period_start, p.partner_id, p.id
            "#
        ))
        .bind(&filter.partner_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Payout::try_from).collect()
    }

    /// Non-cancelled payouts of a partner overlapping `period`.
    pub async fn active_overlapping(&self, partner_id: &str, period: &Period) -> DbResult<Vec<Payout>> {
        let records = sqlx::query_as::<_, PayoutRecord>(&format!(
            r#"SELECT {PAYOUT_COLUMNS} FROM payouts p
            WHERE p.partner_id = ?1
              AND p.status != 'cancelled'
              AND p.period_start < ?3
              AND p.period_end > ?2
            ORDER BY p.period_start, p.id
            "#
        ))
        .bind(partner_id)
        .bind(encode_ts(&period.start))
        .bind(encode_ts(&period.end))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Payout::try_from).collect()
    }

    /// Finds the payout bound to a transfer reference.
    pub async fn find_by_transfer_reference(&self, reference: &str) -> DbResult<Option<Payout>> {
        let record = sqlx::query_as::<_, PayoutRecord>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts p WHERE p.transfer_reference = ?1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Payout::try_from).transpose()
    }

    /// Persists a computed draft, replacing any prior draft wholesale.
    ///
    /// Returns the stored header with its new version.
    pub async fn save_draft(&self, draft: &DraftPayout) -> DbResult<Payout> {
        let payout = &draft.payout;
        let stale = conflict_as_stale(&payout.id);

        let mut tx = self.pool.begin().await?;

        let version = match draft.expected_version {
            None => {
                insert_header(&mut tx, payout, 1).await.map_err(&stale)?;
                1
            }
            Some(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE payouts SET
                        status = 'draft',
                        currency = ?3,
                        gross_total_minor = ?4,
                        commission_total_minor = ?5,
                        adjustment_total_minor = ?6,
                        net_total_minor = ?7,
                        line_item_count = ?8,
                        generated_at = ?9,
                        version = version + 1
                    WHERE id = ?1 AND version = ?2 AND status = 'draft'
                    "#,
                )
                .bind(&payout.id)
                .bind(expected)
                .bind(payout.currency.as_str())
                .bind(payout.gross_total.minor_units())
                .bind(payout.commission_total.minor_units())
                .bind(payout.adjustment_total.minor_units())
                .bind(payout.net_total.minor_units())
                .bind(payout.line_item_count as i64)
                .bind(encode_ts(&payout.generated_at))
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(DbError::stale_payout(&payout.id));
                }
                expected + 1
            }
        };

        sqlx::query("DELETE FROM payout_line_items WHERE payout_id = ?1")
            .bind(&payout.id)
            .execute(&mut *tx)
            .await?;
        release_claims(&mut tx, &payout.id).await?;

        for line in &draft.line_items {
            insert_line_item(&mut tx, line).await?;
            if let Some(sale_id) = &line.sale_id {
                sqlx::query("INSERT INTO settled_sales (sale_id, payout_id) VALUES (?1, ?2)")
                    .bind(sale_id)
                    .bind(&payout.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(DbError::from)
                    .map_err(&stale)?;
            }
        }

        for adjustment_id in &draft.claimed_adjustments {
            let claimed = sqlx::query(
                r#"
                UPDATE adjustments SET consumed_by_payout_id = ?2
                WHERE id = ?1 AND consumed_by_payout_id IS NULL
                "#,
            )
            .bind(adjustment_id)
            .bind(&payout.id)
            .execute(&mut *tx)
            .await?;

            if claimed.rows_affected() == 0 {
                return Err(DbError::stale_payout(&payout.id));
            }
        }

        tx.commit().await?;

        info!(
            payout_id = %payout.id,
            partner_id = %payout.partner_id,
            period = %payout.period,
            line_items = draft.line_items.len(),
            net_total = %payout.net_total,
            version,
            "Draft payout saved"
        );

        let mut stored = payout.clone();
        stored.version = version;
        Ok(stored)
    }

    /// Writes a lifecycle transition if the stored version still equals
    /// `expected_version`.
    ///
    /// Returns the header with its new version.
    pub async fn update_lifecycle(&self, payout: &Payout, expected_version: i64) -> DbResult<Payout> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE payouts SET
                status = ?3,
                finalized_at = ?4,
                paid_at = ?5,
                failed_at = ?6,
                cancelled_at = ?7,
                transfer_reference = ?8,
                failure_reason = ?9,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&payout.id)
        .bind(expected_version)
        .bind(payout.status)
        .bind(encode_opt_ts(&payout.finalized_at))
        .bind(encode_opt_ts(&payout.paid_at))
        .bind(encode_opt_ts(&payout.failed_at))
        .bind(encode_opt_ts(&payout.cancelled_at))
        .bind(&payout.transfer_reference)
        .bind(&payout.failure_reason)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payouts WHERE id = ?1")
                .bind(&payout.id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists == 0 {
                DbError::not_found("Payout", &payout.id)
            } else {
                DbError::stale_payout(&payout.id)
            });
        }

        if payout.status == PayoutStatus::Cancelled {
            release_claims(&mut tx, &payout.id).await?;
        }

        tx.commit().await?;

        debug!(
            payout_id = %payout.id,
            status = %payout.status,
            version = expected_version + 1,
            "Payout lifecycle updated"
        );

        let mut stored = payout.clone();
        stored.version = expected_version + 1;
        Ok(stored)
    }

    /// Rows for the pending-transfer export: payouts in `status`, joined
    /// with the partner's business name.
    pub async fn export_rows(&self, status: PayoutStatus) -> DbResult<Vec<ExportRow>> {
        let records = sqlx::query_as::<_, ExportRecord>(&format!(
            r#"SELECT {PAYOUT_COLUMNS}, partners.business_name
            FROM payouts p
            JOIN partners ON partners.id = p.partner_id
            WHERE p.status = ?1
            ORDER BY p.period_start, p.partner_id, p.generated_at
            "#
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        records
            .into_iter()
            .map(|record| {
                let payout = Payout::try_from(record.payout)?;
                Ok(ExportRow::from_payout(&payout, record.business_name))
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::test_support::{db_with_partner, PARTNER};
    use super::*;
    use crate::Database;
    use chrono::TimeZone;
    use payout_core::{
        compute_draft, CommissionRule, Currency, DraftRequest, Money, NewAdjustment, NewSale,
        Percentage, RuleSchedule, SaleEligibility,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 6, 0, 0).unwrap()
    }

    fn september() -> Period {
        Period::parse_month("2026-09").unwrap()
    }

    fn schedule() -> RuleSchedule {
        RuleSchedule::new(vec![CommissionRule::flat(
            PARTNER,
            Percentage::from_percent(15),
            Percentage::zero(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        )])
        .unwrap()
    }

    async fn seed(db: &Database) {
        db.sales()
            .record(NewSale {
                partner_id: PARTNER.into(),
                buyer_id: "b-1".into(),
                gross_amount: Money::new(10_000, Currency::EUR),
                occurred_at: Utc.with_ymd_and_hms(2026, 9, 5, 12, 0, 0).unwrap(),
                eligibility: SaleEligibility::Paid,
            })
            .await
            .unwrap();
        db.adjustments()
            .append(NewAdjustment {
                partner_id: PARTNER.into(),
                amount: Money::new(-500, Currency::EUR),
                reason: "penalty".into(),
                effective_date: Utc.with_ymd_and_hms(2026, 9, 10, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
    }

    async fn compute(db: &Database, payout_id: Option<&str>) -> DraftPayout {
        let period = september();
        let sales = db.sales().list_settleable(PARTNER, &period, payout_id).await.unwrap();
        let adjustments = db
            .adjustments()
            .claimable_for(PARTNER, &period, payout_id)
            .await
            .unwrap();
        let existing = db.payouts().active_overlapping(PARTNER, &period).await.unwrap();
        let rules = schedule();
        compute_draft(&DraftRequest {
            partner_id: PARTNER,
            period,
            currency: Currency::EUR,
            sales: &sales,
            adjustments: &adjustments,
            rules: &rules,
            existing: &existing,
            now: now(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_draft_and_recompute_replaces_wholesale() {
        let db = db_with_partner().await;
        seed(&db).await;

        let first = compute(&db, None).await;
        let stored = db.payouts().save_draft(&first).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.net_total, Money::new(8_000, Currency::EUR));

        let second = compute(&db, Some(&stored.id)).await;
        assert_eq!(second.expected_version, Some(1));
        let restored = db.payouts().save_draft(&second).await.unwrap();
        assert_eq!(restored.version, 2);

        let items = db.payouts().line_items(&stored.id).await.unwrap();
        assert_eq!(items, first.line_items);
        assert_eq!(db.payouts().get(&stored.id).await.unwrap().unwrap(), restored);

        let sale_id = items[0].sale_id.clone().unwrap();
        assert_eq!(db.sales().settled_by(&sale_id).await.unwrap().as_deref(), Some(stored.id.as_str()));
    }

    #[tokio::test]
    async fn test_stale_draft_write_is_rejected() {
        let db = db_with_partner().await;
        seed(&db).await;

        let first = compute(&db, None).await;
        let stored = db.payouts().save_draft(&first).await.unwrap();

        // Two racing recomputations read the same version
        let a = compute(&db, Some(&stored.id)).await;
        let b = compute(&db, Some(&stored.id)).await;
        db.payouts().save_draft(&a).await.unwrap();
        assert!(matches!(
            db.payouts().save_draft(&b).await,
            Err(DbError::StaleVersion { .. })
        ));

        // Two racing first computations both try to insert a header
        let db = db_with_partner().await;
        seed(&db).await;
        let a = compute(&db, None).await;
        let b = compute(&db, None).await;
        db.payouts().save_draft(&a).await.unwrap();
        assert!(matches!(
            db.payouts().save_draft(&b).await,
            Err(DbError::StaleVersion { .. })
        ));
        assert_eq!(db.payouts().list(&PayoutFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_update_and_cancel_release() {
        let db = db_with_partner().await;
        seed(&db).await;
        let stored = db.payouts().save_draft(&compute(&db, None).await).await.unwrap();

        let mut cancelled = stored.clone();
        cancelled.cancel(now()).unwrap();
        let cancelled = db.payouts().update_lifecycle(&cancelled, stored.version).await.unwrap();
        assert_eq!(cancelled.version, 2);

        // Claims released: a new draft picks up the same sale and adjustment
        let fresh = compute(&db, None).await;
        assert_ne!(fresh.payout.id, stored.id);
        assert_eq!(fresh.payout.line_item_count, 2);
        db.payouts().save_draft(&fresh).await.unwrap();

        // Stale lifecycle write
        let mut again = stored.clone();
        again.status = PayoutStatus::Finalized;
        assert!(matches!(
            db.payouts().update_lifecycle(&again, stored.version).await,
            Err(DbError::StaleVersion { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_filter_and_export_rows() {
        let db = db_with_partner().await;
        seed(&db).await;
        let stored = db.payouts().save_draft(&compute(&db, None).await).await.unwrap();

        let mut finalized = stored.clone();
        finalized.finalize(now()).unwrap();
        let finalized = db.payouts().update_lifecycle(&finalized, stored.version).await.unwrap();

        let filter = PayoutFilter {
            partner_id: Some(PARTNER.into()),
            status: Some(PayoutStatus::Finalized),
        };
        assert_eq!(db.payouts().list(&filter).await.unwrap(), vec![finalized.clone()]);
        let drafts = PayoutFilter {
            status: Some(PayoutStatus::Draft),
            ..PayoutFilter::default()
        };
        assert!(db.payouts().list(&drafts).await.unwrap().is_empty());

        let rows = db.payouts().export_rows(PayoutStatus::Finalized).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].business_name, "Harbour Tours");
        assert_eq!(rows[0].amount, Money::new(8_000, Currency::EUR));
    }

    #[tokio::test]
    async fn test_find_by_transfer_reference() {
        let db = db_with_partner().await;
        seed(&db).await;
        let stored = db.payouts().save_draft(&compute(&db, None).await).await.unwrap();
        let mut payout = stored.clone();
        payout.finalize(now()).unwrap();
        payout.record_transfer_reference("tr-42").unwrap();
        db.payouts().update_lifecycle(&payout, stored.version).await.unwrap();

        let found = db.payouts().find_by_transfer_reference("tr-42").await.unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert!(db.payouts().find_by_transfer_reference("tr-0").await.unwrap().is_none());
    }
}
