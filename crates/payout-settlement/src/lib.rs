//! # payout-settlement: Settlement Orchestration
//!
//! Drives payouts from computation to confirmed transfer.
//!
//! ## Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Payout Lifecycle                                  │
//! │                                                                         │
//! │   compute_draft ──► draft ──finalize──► finalized ──mark_paid──► paid   │
//! │        ▲              │                     │                           │
//! │        │            cancel             mark_failed                      │
//! │        │              ▼                     ▼                           │
//! │        │          cancelled              failed                         │
//! │        │                                    │                           │
//! │        └──────────── reopen ◄───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`service`] - [`SettlementService`], every settlement operation
//! - [`driver`] - [`SettlementDriver`], batch runs across partners
//! - [`ports`] - Collaborator traits (bookings, partner config, transfers,
//!   notifications)
//! - [`sources`] - SQLite-backed booking and partner sources
//! - [`transfer`] - Transfer initiation with exponential backoff
//! - [`notify`] - Notification sinks
//! - [`locks`] - Per-(partner, period) advisory locks
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Settlement error types
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use payout_settlement::{SettlementConfig, SettlementService, ManualTransferProvider};
//!
//! let config = SettlementConfig::load(None)?;
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//! let service = SettlementService::new(db, &config, Arc::new(ManualTransferProvider));
//!
//! let draft = service.compute_draft("partner-1", "2026-09".parse()?).await?;
//! service.finalize(&draft.payout.id).await?;
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod locks;
pub mod notify;
pub mod ports;
pub mod service;
pub mod sources;
pub mod transfer;

pub use config::SettlementConfig;
pub use driver::{BatchReport, PartnerOutcome, PartnerResult, SettlementDriver};
pub use error::{SettlementError, SettlementResult};
pub use locks::{PeriodGuard, PeriodLocks};
pub use notify::LogNotificationSink;
pub use ports::{
    BookingSource, NotificationError, NotificationSink, PartnerConfigSource, PayoutEvent, TransferError,
    TransferProvider,
};
pub use service::{NewPartner, PayoutDetail, SettlementService, TransferOutcome};
pub use sources::{DbBookingSource, DbPartnerConfigSource};
pub use transfer::{initiate_with_retry, InitiationResult, ManualTransferProvider, RetryPolicy};
