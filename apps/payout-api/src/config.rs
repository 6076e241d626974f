//! API server configuration.
//!
//! Loaded from environment variables with fallback to defaults. Settlement
//! settings live in their own TOML file, see
//! [`SettlementConfig`](payout_settlement::SettlementConfig).

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind: IpAddr,

    /// HTTP port.
    pub port: u16,

    /// Settlement config file; the platform default is used when unset.
    pub settlement_config_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            settlement_config_path: None,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let bind = match lookup("PAYOUT_API_BIND") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PAYOUT_API_BIND".to_string()))?,
            None => defaults.bind,
        };

        let port = match lookup("PAYOUT_API_PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PAYOUT_API_PORT".to_string()))?,
            None => defaults.port,
        };

        let settlement_config_path = lookup("PAYOUT_CONFIG_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(ApiConfig {
            bind,
            port,
            settlement_config_path,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let env: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| env.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert!(config.settlement_config_path.is_none());
    }

    #[test]
    fn test_env_values() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("PAYOUT_API_BIND", "127.0.0.1"),
            ("PAYOUT_API_PORT", "9090"),
            ("PAYOUT_CONFIG_PATH", "/etc/payouts/settlement.toml"),
        ]))
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9090");
        assert_eq!(
            config.settlement_config_path,
            Some(PathBuf::from("/etc/payouts/settlement.toml"))
        );
    }

    #[test]
    fn test_invalid_port() {
        let err = ApiConfig::from_lookup(lookup(&[("PAYOUT_API_PORT", "eighty")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for PAYOUT_API_PORT");
    }
}
