//! # payout-db
//!
//! SQLite persistence for partners, commission rules, the booking ledger
//! and payouts.
//!
//! ```text
//!   payout-settlement
//!         │  Database::payouts().save_draft(draft, expected_version)
//!         ▼
//!   ┌──────────────┬──────────────────────────────────────────────┐
//!   │ pool.rs      │ SqlitePool, WAL, foreign keys, busy timeout   │
//!   │ repository/  │ one repository per table group                │
//!   │ migrations   │ embedded from migrations/sqlite               │
//!   └──────────────┴──────────────────────────────────────────────┘
//!         │
//!         ▼
//!   payouts.db
//! ```
//!
//! Payout writes are guarded twice. A `version` column gives optimistic
//! compare-and-swap, and `settled_sales` (one row per sale claimed by a
//! live payout) makes double settlement a primary key violation.
//!
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("payouts.db")).await?;
//! let period = Period::parse_month("2026-09")?;
//! let sales = db.sales().list_settleable("partner-1", &period, None).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

pub use repository::adjustment::AdjustmentRepository;
pub use repository::partner::PartnerRepository;
pub use repository::payout::{PayoutFilter, PayoutRepository};
pub use repository::rule::RuleRepository;
pub use repository::sale::SaleRepository;
