//! # Partner Repository
//!
//! The partner directory: business name for exports, settlement currency
//! and payout destination for transfers.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::{decode_currency, encode_ts};
use crate::error::{DbError, DbResult};
use payout_core::Partner;

/// Row shape of the `partners` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PartnerRecord {
    pub id: String,
    pub business_name: String,
    pub currency: String,
    pub payout_destination: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PartnerRecord> for Partner {
    type Error = DbError;

    fn try_from(record: PartnerRecord) -> Result<Self, Self::Error> {
        Ok(Partner {
            currency: decode_currency(&record.currency)?,
            id: record.id,
            business_name: record.business_name,
            payout_destination: record.payout_destination,
            created_at: record.created_at,
        })
    }
}

/// Repository for partner database operations.
#[derive(Debug, Clone)]
pub struct PartnerRepository {
    pool: SqlitePool,
}

impl PartnerRepository {
    /// Creates a new PartnerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PartnerRepository { pool }
    }

    /// Inserts a partner or updates its name and destination.
    ///
    /// The settlement currency never changes once set.
    pub async fn upsert(&self, partner: &Partner) -> DbResult<()> {
        debug!(partner_id = %partner.id, "Upserting partner");

        sqlx::query(
            r#"
            INSERT INTO partners (id, business_name, currency, payout_destination, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO UPDATE SET
                business_name = excluded.business_name,
                payout_destination = excluded.payout_destination
            "#,
        )
        .bind(&partner.id)
        .bind(&partner.business_name)
        .bind(partner.currency.as_str())
        .bind(&partner.payout_destination)
        .bind(encode_ts(&partner.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a partner by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Partner>> {
        let record = sqlx::query_as::<_, PartnerRecord>(
            r#"
            SELECT id, business_name, currency, payout_destination, created_at
            FROM partners
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Partner::try_from).transpose()
    }

    /// Lists all partners ordered by id.
    pub async fn list(&self) -> DbResult<Vec<Partner>> {
        let records = sqlx::query_as::<_, PartnerRecord>(
            r#"
            SELECT id, business_name, currency, payout_destination, created_at
            FROM partners
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Partner::try_from).collect()
    }

    /// Counts partners (used by the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM partners")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
