//! # Settlement Configuration
//!
//! Configuration management for the settlement engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PAYOUT_DB_PATH=/var/lib/payouts/payouts.db                         │
//! │     PAYOUT_PERIOD_CADENCE=weekly                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/payout-engine/settlement.toml (Linux)                    │
//! │     ~/Library/Application Support/com.payouts.engine/... (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     monthly cadence, 4 concurrent partners, 5 transfer attempts       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # settlement.toml
//! [database]
//! path = "payouts.db"
//! max_connections = 5
//!
//! [settlement]
//! cadence = "monthly"    # monthly | weekly
//! batch_concurrency = 4
//! default_currency = "EUR"
//!
//! [transfer]
//! max_attempts = 5
//! initial_backoff_ms = 500
//! max_backoff_secs = 30
//! ```

use payout_core::{Currency, PeriodCadence};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SettlementError, SettlementResult};
use crate::transfer::RetryPolicy;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the settlement store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Maximum pool connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("payouts.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Settlement Settings
// =============================================================================

/// Batch settlement behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Length of a settlement period.
    #[serde(default)]
    pub cadence: PeriodCadence,

    /// Partners computed concurrently in one batch run.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Currency for partners registered without one.
    #[serde(default = "default_currency")]
    pub default_currency: Currency,
}

fn default_batch_concurrency() -> usize {
    4
}

fn default_currency() -> Currency {
    Currency::EUR
}

impl Default for SettlementSettings {
    fn default() -> Self {
        SettlementSettings {
            cadence: PeriodCadence::default(),
            batch_concurrency: default_batch_concurrency(),
            default_currency: default_currency(),
        }
    }
}

// =============================================================================
// Transfer Settings
// =============================================================================

/// Retry behavior for network failures of the transfer provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Attempts per initiation, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    30
}

impl Default for TransferSettings {
    fn default() -> Self {
        TransferSettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Settlement Configuration
// =============================================================================

/// Complete settlement configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub settlement: SettlementSettings,

    #[serde(default)]
    pub transfer: TransferSettings,
}

impl SettlementConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (settlement.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SettlementResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading settlement config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml(contents: &str) -> SettlementResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SettlementResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(SettlementError::Config("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(SettlementError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.settlement.batch_concurrency == 0 {
            return Err(SettlementError::Config(
                "settlement.batch_concurrency must be greater than 0".into(),
            ));
        }
        if self.transfer.max_attempts == 0 {
            return Err(SettlementError::Config(
                "transfer.max_attempts must be at least 1".into(),
            ));
        }
        if self.transfer.initial_backoff_ms > self.transfer.max_backoff_secs.saturating_mul(1000) {
            return Err(SettlementError::Config(
                "transfer.initial_backoff_ms must not exceed transfer.max_backoff_secs".into(),
            ));
        }
        Ok(())
    }

    /// Retry policy for transfer initiation.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.transfer.max_attempts,
            initial_backoff: Duration::from_millis(self.transfer.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.transfer.max_backoff_secs),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `PAYOUT_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("PAYOUT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(cadence) = lookup("PAYOUT_PERIOD_CADENCE") {
            match cadence.parse() {
                Ok(parsed) => self.settlement.cadence = parsed,
                Err(_) => warn!(cadence = %cadence, "Unknown period cadence in environment"),
            }
        }

        if let Some(value) = lookup("PAYOUT_BATCH_CONCURRENCY") {
            match value.parse() {
                Ok(n) => self.settlement.batch_concurrency = n,
                Err(_) => warn!(value = %value, "Invalid PAYOUT_BATCH_CONCURRENCY"),
            }
        }

        if let Some(value) = lookup("PAYOUT_TRANSFER_MAX_ATTEMPTS") {
            match value.parse() {
                Ok(n) => self.transfer.max_attempts = n,
                Err(_) => warn!(value = %value, "Invalid PAYOUT_TRANSFER_MAX_ATTEMPTS"),
            }
        }

        if let Some(value) = lookup("PAYOUT_TRANSFER_INITIAL_BACKOFF_MS") {
            match value.parse() {
                Ok(n) => self.transfer.initial_backoff_ms = n,
                Err(_) => warn!(value = %value, "Invalid PAYOUT_TRANSFER_INITIAL_BACKOFF_MS"),
            }
        }

        if let Some(value) = lookup("PAYOUT_TRANSFER_MAX_BACKOFF_SECS") {
            match value.parse() {
                Ok(n) => self.transfer.max_backoff_secs = n,
                Err(_) => warn!(value = %value, "Invalid PAYOUT_TRANSFER_MAX_BACKOFF_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "payouts", "engine")
            .map(|dirs| dirs.config_dir().join("settlement.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SettlementConfig::default();
        assert_eq!(config.settlement.cadence, PeriodCadence::Monthly);
        assert_eq!(config.settlement.batch_concurrency, 4);
        assert_eq!(config.transfer.max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SettlementConfig::from_toml(
            r#"
            [settlement]
            cadence = "weekly"
            default_currency = "USD"

            [transfer]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.settlement.cadence, PeriodCadence::Weekly);
        assert_eq!(config.settlement.default_currency, Currency::USD);
        assert_eq!(config.transfer.max_attempts, 3);
        assert_eq!(config.transfer.initial_backoff_ms, 500);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = SettlementConfig::from_toml("[settlement]\ncadence = \"yearly\"").unwrap_err();
        assert!(matches!(err, SettlementError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PAYOUT_DB_PATH", "/tmp/p.db"),
            ("PAYOUT_PERIOD_CADENCE", "weekly"),
            ("PAYOUT_BATCH_CONCURRENCY", "16"),
            ("PAYOUT_TRANSFER_MAX_ATTEMPTS", "not-a-number"),
        ]);
        let mut config = SettlementConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/p.db"));
        assert_eq!(config.settlement.cadence, PeriodCadence::Weekly);
        assert_eq!(config.settlement.batch_concurrency, 16);
        assert_eq!(config.transfer.max_attempts, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SettlementConfig::default();
        config.settlement.batch_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = SettlementConfig::default();
        config.transfer.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = SettlementConfig::default();
        config.transfer.initial_backoff_ms = 10_000;
        config.transfer.max_backoff_secs = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = SettlementConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
        assert_eq!(policy.max_backoff, Duration::from_secs(30));
    }
}
