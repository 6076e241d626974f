//! # Pending Transfer Export
//!
//! Renders finalized-but-unpaid payouts as CSV for manual transfer
//! initiation.
//!
//! ## Format
//! ```text
//! partner_id,business_name,amount,currency,period_start,period_end,created_at
//! partner-1,Harbour Tours,82.00,EUR,2026-09-01T00:00:00Z,2026-10-01T00:00:00Z,2026-10-01T06:00:00Z
//! ```
//!
//! - Column order is fixed.
//! - Rows sorted by `(period_start, partner_id, created_at)`.
//! - Timestamps are RFC 3339 UTC at second precision.
//! - The header is written even when there are no rows.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Payout;

/// CSV header, in output order.
pub const EXPORT_COLUMNS: [&str; 7] = [
    "partner_id",
    "business_name",
    "amount",
    "currency",
    "period_start",
    "period_end",
    "created_at",
];

/// One payout awaiting manual transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub payout_id: String,
    pub partner_id: String,
    pub business_name: String,
    /// The payout's net total.
    pub amount: Money,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ExportRow {
    pub fn from_payout(payout: &Payout, business_name: impl Into<String>) -> Self {
        ExportRow {
            payout_id: payout.id.clone(),
            partner_id: payout.partner_id.clone(),
            business_name: business_name.into(),
            amount: payout.net_total,
            period_start: payout.period.start,
            period_end: payout.period.end,
            created_at: payout.generated_at,
        }
    }

    fn sort_key(&self) -> (DateTime<Utc>, &str, DateTime<Utc>, &str) {
        (self.period_start, &self.partner_id, self.created_at, &self.payout_id)
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Renders rows as CSV, sorted for reproducible output.
pub fn render_csv(mut rows: Vec<ExportRow>) -> CoreResult<String> {
    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(EXPORT_COLUMNS)
        .map_err(|e| CoreError::Export(format!("CSV write error: {e}")))?;

    for row in &rows {
        let amount = row.amount.to_decimal_string();
        let currency = row.amount.currency();
        let (start, end, created) = (
            timestamp(&row.period_start),
            timestamp(&row.period_end),
            timestamp(&row.created_at),
        );
        writer
            .write_record([
                row.partner_id.as_str(),
                row.business_name.as_str(),
                amount.as_str(),
                currency.as_str(),
                start.as_str(),
                end.as_str(),
                created.as_str(),
            ])
            .map_err(|e| CoreError::Export(format!("CSV write error: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Export(format!("CSV flush error: {e}")))?;
    String::from_utf8(bytes).map_err(|e| CoreError::Export(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================
