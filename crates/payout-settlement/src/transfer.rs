//! # Transfer Initiation
//!
//! Calls the transfer provider with exponential backoff on network
//! failures.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Transfer Initiation Attempts                           │
//! │                                                                         │
//! │  attempt 1 ──► Ok(reference)          → Initiated                       │
//! │            ──► Err(Declined)          → Declined (no retry)             │
//! │            ──► Err(Network) ──┐                                         │
//! │                               │ sleep(backoff)  500ms, 1s, 2s ... max   │
//! │  attempt 2 ◄──────────────────┘                                         │
//! │  ...                                                                    │
//! │  attempt N ──► Err(Network)           → Exhausted (payout untouched)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use payout_core::Money;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ports::{TransferError, TransferProvider};

/// Bounded exponential retry for transfer initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            // Attempts are bounded by max_attempts instead
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Result of one initiation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiationResult {
    Initiated { reference: String, attempts: u32 },
    Declined { reason: String, attempts: u32 },
    Exhausted { last_error: String, attempts: u32 },
}

/// Calls `provider.initiate_transfer` until it succeeds, declines, or the
/// attempt budget runs out.
pub async fn initiate_with_retry(
    provider: &dyn TransferProvider,
    policy: &RetryPolicy,
    payout_id: &str,
    net_amount: Money,
    destination: &str,
) -> InitiationResult {
    let mut backoff = policy.create_backoff();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match provider.initiate_transfer(payout_id, net_amount, destination).await {
            Ok(reference) => {
                info!(payout_id, reference = %reference, attempt, "Transfer initiated");
                return InitiationResult::Initiated {
                    reference,
                    attempts: attempt,
                };
            }
            Err(TransferError::Declined(reason)) => {
                warn!(payout_id, reason = %reason, attempt, "Transfer declined");
                return InitiationResult::Declined {
                    reason,
                    attempts: attempt,
                };
            }
            Err(TransferError::Network(message)) => {
                if attempt >= policy.max_attempts {
                    warn!(
                        payout_id,
                        error = %message,
                        attempts = attempt,
                        "Transfer attempts exhausted, payout left finalized"
                    );
                    return InitiationResult::Exhausted {
                        last_error: message,
                        attempts: attempt,
                    };
                }

                let Some(delay) = backoff.next_backoff() else {
                    return InitiationResult::Exhausted {
                        last_error: message,
                        attempts: attempt,
                    };
                };
                debug!(payout_id, error = %message, attempt, ?delay, "Transfer failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Provider for operators who move funds by hand from the CSV export.
///
/// Accepts every transfer and hands back a `manual-<uuid>` reference that
/// the operator confirms later through the confirmation webhook.
#[derive(Debug, Clone, Default)]
pub struct ManualTransferProvider;

#[async_trait]
impl TransferProvider for ManualTransferProvider {
    async fn initiate_transfer(
        &self,
        payout_id: &str,
        net_amount: Money,
        destination: &str,
    ) -> Result<String, TransferError> {
        let reference = format!("manual-{}", Uuid::new_v4());
        info!(
            payout_id,
            amount = %net_amount,
            destination,
            reference = %reference,
            "Manual transfer registered"
        );
        Ok(reference)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use payout_core::Currency;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Provider that replays a fixed script of responses.
    pub(crate) struct ScriptedProvider {
        script: Mutex<VecDeque<Result<String, TransferError>>>,
        pub calls: AtomicU32,
    }

    impl ScriptedProvider {
        pub(crate) fn new(script: Vec<Result<String, TransferError>>) -> Self {
            ScriptedProvider {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransferProvider for ScriptedProvider {
        async fn initiate_transfer(
            &self,
            _payout_id: &str,
            _net_amount: Money,
            _destination: &str,
        ) -> Result<String, TransferError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransferError::Network("script exhausted".into())))
        }
    }

    pub(crate) fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    fn net() -> Money {
        Money::new(8_200, Currency::EUR)
    }

    #[tokio::test]
    async fn test_network_failures_are_retried() {
        let provider = ScriptedProvider::new(vec![
            Err(TransferError::Network("reset".into())),
            Err(TransferError::Network("timeout".into())),
            Ok("tr-1".into()),
        ]);
        let result = initiate_with_retry(&provider, &fast_policy(5), "p-1", net(), "DE89").await;
        assert_eq!(
            result,
            InitiationResult::Initiated {
                reference: "tr-1".into(),
                attempts: 3
            }
        );
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_decline_is_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(TransferError::Declined("closed".into()))]);
        let result = initiate_with_retry(&provider, &fast_policy(5), "p-1", net(), "DE89").await;
        assert!(matches!(result, InitiationResult::Declined { attempts: 1, .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let provider = ScriptedProvider::new(vec![]);
        let result = initiate_with_retry(&provider, &fast_policy(3), "p-1", net(), "DE89").await;
        assert!(matches!(result, InitiationResult::Exhausted { attempts: 3, .. }));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_manual_provider_issues_references() {
        let reference = ManualTransferProvider
            .initiate_transfer("p-1", net(), "DE89")
            .await
            .unwrap();
        assert!(reference.starts_with("manual-"));
    }
}
