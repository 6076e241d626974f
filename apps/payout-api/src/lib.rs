//! # Payout API
//!
//! HTTP surface of the payout settlement engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payout API Server                                │
//! │                                                                         │
//! │  Operator / automation ──► HTTP (8080) ──► SettlementService ──► SQLite │
//! │                                 ▲                  │                    │
//! │  Transfer provider ─── webhooks ┘                  ▼                    │
//! │                                          TransferProvider               │
//! │                                          NotificationSink               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod routes;

pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult};
pub use routes::{build_router, AppState};
