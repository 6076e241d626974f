//! Ledger inputs: partners, commission rules, sales and adjustments.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, SubsecRound, Utc};
use payout_core::{
    Adjustment, CommissionModel, CommissionRule, NewAdjustment, NewSale, Partner, Percentage, Sale,
};
use payout_settlement::NewPartner;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/partners", post(register_partner))
        .route("/partners/{id}/rules", post(add_rule))
        .route("/sales", post(record_sale))
        .route("/sales/{id}/reverse", post(reverse_sale))
        .route("/adjustments", post(record_adjustment))
}

async fn register_partner(
    State(state): State<AppState>,
    Json(body): Json<NewPartner>,
) -> ApiResult<(StatusCode, Json<Partner>)> {
    let partner = state.service.register_partner(body).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

/// Rates are in basis points (1500 = 15%).
#[derive(Debug, Deserialize)]
pub struct RuleBody {
    pub model: CommissionModel,
    pub rate: Percentage,
    #[serde(default)]
    pub repeat_rate: Option<Percentage>,
    pub tax_rate_on_commission: Percentage,
    pub effective_from: DateTime<Utc>,
}

async fn add_rule(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Json(body): Json<RuleBody>,
) -> ApiResult<(StatusCode, Json<CommissionRule>)> {
    let rule = match (body.model, body.repeat_rate) {
        (CommissionModel::Flat, None) => {
            CommissionRule::flat(partner_id, body.rate, body.tax_rate_on_commission, body.effective_from)
        }
        (CommissionModel::Acquisition, Some(repeat)) => CommissionRule::acquisition(
            partner_id,
            body.rate,
            repeat,
            body.tax_rate_on_commission,
            body.effective_from,
        ),
        (CommissionModel::Flat, Some(_)) => {
            return Err(ApiError::InvalidRequest("flat rules take no repeat_rate".into()))
        }
        (CommissionModel::Acquisition, None) => {
            return Err(ApiError::InvalidRequest("acquisition rules need a repeat_rate".into()))
        }
    };
    let rule = state.service.add_rule(rule).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn record_sale(
    State(state): State<AppState>,
    Json(body): Json<NewSale>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    let sale = state.service.record_sale(body).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

#[derive(Debug, Deserialize)]
pub struct ReverseBody {
    pub reason: String,
    /// Defaults to now.
    #[serde(default)]
    pub reversed_at: Option<DateTime<Utc>>,
}

async fn reverse_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
    Json(body): Json<ReverseBody>,
) -> ApiResult<(StatusCode, Json<Adjustment>)> {
    let reversed_at = body.reversed_at.unwrap_or_else(Utc::now).trunc_subsecs(6);
    let adjustment = state.service.reverse_sale(&sale_id, reversed_at, &body.reason).await?;
    Ok((StatusCode::CREATED, Json(adjustment)))
}

async fn record_adjustment(
    State(state): State<AppState>,
    Json(body): Json<NewAdjustment>,
) -> ApiResult<(StatusCode, Json<Adjustment>)> {
    let adjustment = state.service.record_adjustment(body).await?;
    Ok((StatusCode::CREATED, Json(adjustment)))
}
