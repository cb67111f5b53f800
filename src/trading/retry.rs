//! Retrying gateway wrapper
//!
//! Centralizes retry/backoff for swap execution instead of scattering
//! it across call sites. Transient failures are retried with
//! exponential backoff; scam detection and other permanent failures
//! are returned immediately.

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use std::time::Duration;
use tracing::{error, warn};

use crate::config::SwapApiConfig;
use crate::error::Result;
use crate::trading::gateway::{ExecutionGateway, SwapReceipt, SwapRequest};

/// Backoff-wrapping execution gateway
pub struct RetryingGateway<G> {
    inner: G,
    base_delay: Duration,
    max_elapsed: Duration,
}

impl<G: ExecutionGateway> RetryingGateway<G> {
    pub fn new(inner: G, config: &SwapApiConfig) -> Self {
        Self {
            inner,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_elapsed: Duration::from_millis(config.retry_max_elapsed_ms),
        }
    }

    #[cfg(test)]
    pub fn with_timing(inner: G, base_delay: Duration, max_elapsed: Duration) -> Self {
        Self {
            inner,
            base_delay,
            max_elapsed,
        }
    }
}

#[async_trait]
impl<G: ExecutionGateway> ExecutionGateway for RetryingGateway<G> {
    async fn swap(&self, request: &SwapRequest) -> Result<SwapReceipt> {
        let backoff = ExponentialBackoff {
            initial_interval: self.base_delay,
            max_interval: self.base_delay * 4,
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let result = retry(backoff, || async {
            match self.inner.swap(request).await {
                Ok(receipt) => Ok(receipt),
                Err(e) if e.is_retryable() => {
                    warn!("Retryable swap error for {}: {}", request.token_address, e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => {
                    error!("Permanent swap error for {}: {}", request.token_address, e);
                    Err(backoff::Error::permanent(e))
                }
            }
        })
        .await?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyGateway {
        failures_before_success: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExecutionGateway for FlakyGateway {
        async fn swap(&self, _request: &SwapRequest) -> Result<SwapReceipt> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(Error::SwapFailed("route unavailable".to_string()))
            } else {
                Ok(SwapReceipt {
                    output_amount: 100.0,
                    signature: "sig".to_string(),
                })
            }
        }
    }

    struct ScamGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExecutionGateway for ScamGateway {
        async fn swap(&self, request: &SwapRequest) -> Result<SwapReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::ScamDetected(request.token_address.clone()))
        }
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let gateway = RetryingGateway::with_timing(
            FlakyGateway {
                failures_before_success: 2,
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(1),
            Duration::from_secs(1),
        );

        let receipt = gateway
            .swap(&SwapRequest::buy("mint", 0.1, 5.0))
            .await
            .unwrap();
        assert!((receipt.output_amount - 100.0).abs() < 1e-9);
        assert_eq!(gateway.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_scam_never_retried() {
        let gateway = RetryingGateway::with_timing(
            ScamGateway {
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(1),
            Duration::from_secs(1),
        );

        let err = gateway
            .swap(&SwapRequest::sell("mint", 100.0, 5.0))
            .await
            .unwrap_err();
        assert!(err.is_scam());
        assert_eq!(gateway.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_elapsed() {
        let gateway = RetryingGateway::with_timing(
            FlakyGateway {
                failures_before_success: usize::MAX,
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(1),
            Duration::from_millis(20),
        );

        let err = gateway
            .swap(&SwapRequest::buy("mint", 0.1, 5.0))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
