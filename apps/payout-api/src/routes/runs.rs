//! Settlement batch runs and transfer provider webhooks.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use payout_core::{Payout, Period};
use payout_settlement::BatchReport;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::routes::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settlement-runs", post(run_settlement))
        .route("/webhooks/transfers/confirmed", post(transfer_confirmed))
        .route("/webhooks/transfers/declined", post(transfer_declined))
}

/// Either an explicit period, or a reference time whose prior period is
/// settled. An empty body settles the period before now.
#[derive(Debug, Default, Deserialize)]
pub struct RunBody {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub reference: Option<DateTime<Utc>>,
}

async fn run_settlement(State(state): State<AppState>, Json(body): Json<RunBody>) -> ApiResult<Json<BatchReport>> {
    let cancel = state.shutdown.clone();
    let report = match body.period {
        Some(period) => {
            let period: Period = period.parse()?;
            state.driver.run_period(period, cancel).await?
        }
        None => {
            let reference = body.reference.unwrap_or_else(Utc::now);
            state.driver.run_batch(reference, cancel).await?
        }
    };
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmedBody {
    #[serde(alias = "transferReference")]
    pub transfer_reference: String,
}

async fn transfer_confirmed(
    State(state): State<AppState>,
    Json(body): Json<ConfirmedBody>,
) -> ApiResult<Json<Payout>> {
    Ok(Json(state.service.on_transfer_confirmed(&body.transfer_reference).await?))
}

#[derive(Debug, Deserialize)]
pub struct DeclinedBody {
    #[serde(alias = "transferReference")]
    pub transfer_reference: String,
    pub reason: String,
}

async fn transfer_declined(
    State(state): State<AppState>,
    Json(body): Json<DeclinedBody>,
) -> ApiResult<Json<Payout>> {
    Ok(Json(
        state
            .service
            .on_transfer_declined(&body.transfer_reference, &body.reason)
            .await?,
    ))
}
