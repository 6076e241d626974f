//! Payout endpoints: listing, draft computation, lifecycle and export.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use payout_core::{Payout, PayoutStatus, Period};
use payout_db::PayoutFilter;
use payout_settlement::{PayoutDetail, TransferOutcome};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payouts", get(list_payouts))
        .route("/payouts/export", get(export_payouts))
        .route("/payouts/{id}", get(get_payout))
        .route("/payouts/{id}/draft", post(compute_draft))
        .route("/payouts/{id}/finalize", post(finalize))
        .route("/payouts/{id}/mark-paid", post(mark_paid))
        .route("/payouts/{id}/mark-failed", post(mark_failed))
        .route("/payouts/{id}/reopen", post(reopen))
        .route("/payouts/{id}/cancel", post(cancel))
        .route("/payouts/{id}/transfer", post(initiate_transfer))
}

fn parse_status(value: Option<&str>) -> ApiResult<Option<PayoutStatus>> {
    Ok(value.map(str::parse::<PayoutStatus>).transpose()?)
}

// =============================================================================
// Queries
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "partnerId", alias = "partner_id")]
    pub partner_id: Option<String>,
    pub status: Option<String>,
}

async fn list_payouts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Payout>>> {
    let filter = PayoutFilter {
        partner_id: query.partner_id,
        status: parse_status(query.status.as_deref())?,
    };
    Ok(Json(state.service.list(&filter).await?))
}

async fn get_payout(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<PayoutDetail>> {
    Ok(Json(state.service.get(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub status: Option<String>,
    pub format: Option<String>,
}

async fn export_payouts(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    if let Some(format) = query.format.as_deref() {
        if !format.eq_ignore_ascii_case("csv") {
            return Err(ApiError::InvalidRequest(format!("unsupported export format '{format}'")));
        }
    }
    let status = parse_status(query.status.as_deref())?.unwrap_or(PayoutStatus::Finalized);
    let csv = state.service.export_csv(status).await?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv))
}

// =============================================================================
// Draft
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DraftQuery {
    /// `YYYY-MM` or `YYYY-MM-DD..YYYY-MM-DD`.
    pub period: String,
}

/// `{id}` is the partner id here; the payout id is not known yet.
async fn compute_draft(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Query(query): Query<DraftQuery>,
) -> ApiResult<Json<PayoutDetail>> {
    let period: Period = query.period.parse()?;
    let draft = state.service.compute_draft(&partner_id, period).await?;
    Ok(Json(PayoutDetail {
        payout: draft.payout,
        line_items: draft.line_items,
    }))
}

// =============================================================================
// Lifecycle
// =============================================================================

async fn finalize(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Payout>> {
    Ok(Json(state.service.finalize(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct MarkPaidBody {
    #[serde(alias = "transferReference")]
    pub transfer_reference: String,
}

async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MarkPaidBody>,
) -> ApiResult<Json<Payout>> {
    Ok(Json(state.service.mark_paid(&id, &body.transfer_reference).await?))
}

#[derive(Debug, Deserialize)]
pub struct MarkFailedBody {
    pub reason: String,
}

async fn mark_failed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MarkFailedBody>,
) -> ApiResult<Json<Payout>> {
    Ok(Json(state.service.mark_failed(&id, &body.reason).await?))
}

async fn reopen(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Payout>> {
    Ok(Json(state.service.reopen(&id).await?))
}

async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Payout>> {
    Ok(Json(state.service.cancel(&id).await?))
}

async fn initiate_transfer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TransferOutcome>> {
    Ok(Json(state.service.initiate_transfer(&id).await?))
}
