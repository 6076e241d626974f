//! HTTP routes.
//!
//! - [`payouts`]: list, detail, draft, lifecycle, transfer, export
//! - [`ledger`]: partners, commission rules, sales, adjustments
//! - [`runs`]: settlement batch runs and transfer webhooks
//! - [`health`]: liveness with a database probe

pub mod health;
pub mod ledger;
pub mod payouts;
pub mod runs;

use axum::Router;
use payout_settlement::{SettlementDriver, SettlementService};
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SettlementService>,
    pub driver: SettlementDriver,
    /// Flips to `true` on shutdown; batch runs stop between partners.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(service: Arc<SettlementService>, batch_concurrency: usize, shutdown: watch::Receiver<bool>) -> Self {
        AppState {
            driver: SettlementDriver::new(service.clone(), batch_concurrency),
            service,
            shutdown,
        }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(payouts::routes())
        .merge(ledger::routes())
        .merge(runs::routes())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use payout_db::{Database, DbConfig};
    use payout_settlement::{ManualTransferProvider, SettlementConfig};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = SettlementService::new(db, &SettlementConfig::default(), Arc::new(ManualTransferProvider));
        let (_tx, rx) = watch::channel(false);
        build_router(AppState::new(Arc::new(service), 2, rx))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn call_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, text) = call(app, method, uri, body).await;
        (status, serde_json::from_str(&text).unwrap())
    }

    /// Registers partner p1 on a flat 15% rule with 20% tax and one
    /// 100.00 EUR sale in September 2026.
    async fn seed(app: &Router) {
        let (status, _) = call_json(
            app,
            Method::POST,
            "/partners",
            Some(json!({
                "id": "p1",
                "business_name": "Hotel One",
                "payout_destination": "DE89370400440532013000"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = call_json(
            app,
            Method::POST,
            "/partners/p1/rules",
            Some(json!({
                "model": "flat",
                "rate": 1500,
                "tax_rate_on_commission": 2000,
                "effective_from": "2026-01-01T00:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = call_json(
            app,
            Method::POST,
            "/sales",
            Some(json!({
                "partner_id": "p1",
                "buyer_id": "b1",
                "gross_amount": { "minor": 10000, "currency": "EUR" },
                "occurred_at": "2026-09-05T12:00:00Z",
                "eligibility": "paid"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = call_json(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_payout_flow_end_to_end() {
        let app = app().await;
        seed(&app).await;

        let (status, draft) = call_json(&app, Method::POST, "/payouts/p1/draft?period=2026-09", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(draft["payout"]["net_total"]["minor"], 8200);
        assert_eq!(draft["line_items"].as_array().unwrap().len(), 1);
        let id = draft["payout"]["id"].as_str().unwrap().to_string();

        let (status, payout) = call_json(&app, Method::POST, &format!("/payouts/{id}/finalize"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payout["status"], "finalized");

        let (status, csv) = call(&app, Method::GET, "/payouts/export?status=finalized&format=csv", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(csv.starts_with("partner_id,business_name,amount,currency,period_start,period_end,created_at\n"));
        assert!(csv.contains("p1,Hotel One,82.00,EUR,2026-09-01T00:00:00Z,2026-10-01T00:00:00Z,"));

        let (status, outcome) = call_json(&app, Method::POST, &format!("/payouts/{id}/transfer"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["outcome"], "initiated");
        let reference = outcome["reference"].as_str().unwrap().to_string();

        let (status, paid) = call_json(
            &app,
            Method::POST,
            "/webhooks/transfers/confirmed",
            Some(json!({ "transfer_reference": reference })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(paid["status"], "paid");

        let (status, list) = call_json(&app, Method::GET, "/payouts?partnerId=p1&status=paid", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (_, detail) = call_json(&app, Method::GET, &format!("/payouts/{id}"), None).await;
        assert_eq!(detail["payout"]["transfer_reference"], reference.as_str());
    }

    #[tokio::test]
    async fn test_errors_carry_code_and_status() {
        let app = app().await;
        seed(&app).await;

        let (status, body) = call_json(&app, Method::POST, "/payouts/missing/finalize", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, body) = call_json(&app, Method::POST, "/payouts/p1/draft?period=2026-13", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PERIOD");

        let (_, draft) = call_json(&app, Method::POST, "/payouts/p1/draft?period=2026-09", None).await;
        let id = draft["payout"]["id"].as_str().unwrap().to_string();
        let (status, body) = call_json(
            &app,
            Method::POST,
            &format!("/payouts/{id}/mark-paid"),
            Some(json!({ "transfer_reference": "tr-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_TRANSITION");

        let (status, body) = call_json(&app, Method::GET, "/payouts/export?format=xml", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");

        let (status, body) = call_json(&app, Method::GET, "/payouts?status=archived", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_adjustment_and_cancel() {
        let app = app().await;
        seed(&app).await;

        let (status, _) = call_json(
            &app,
            Method::POST,
            "/adjustments",
            Some(json!({
                "partner_id": "p1",
                "amount": { "minor": -500, "currency": "EUR" },
                "reason": "late check-in penalty",
                "effective_date": "2026-09-10T00:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, draft) = call_json(&app, Method::POST, "/payouts/p1/draft?period=2026-09", None).await;
        assert_eq!(draft["payout"]["net_total"]["minor"], 7700);
        let id = draft["payout"]["id"].as_str().unwrap().to_string();

        let (status, cancelled) = call_json(&app, Method::POST, &format!("/payouts/{id}/cancel"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_settlement_run() {
        let app = app().await;
        seed(&app).await;

        let (status, report) = call_json(
            &app,
            Method::POST,
            "/settlement-runs",
            Some(json!({ "period": "2026-09" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["cancelled"], false);
        assert_eq!(report["outcomes"][0]["partner_id"], "p1");
        assert_eq!(report["outcomes"][0]["outcome"], "drafted");
        assert_eq!(report["outcomes"][0]["net_total"]["minor"], 8200);
    }
}
