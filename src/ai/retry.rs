//! Retry-with-Backoff Fetcher
//!
//! Wraps a single outbound HTTP call. HTTP 429/503 and transport failures are
//! retried on an exponential schedule (1s, 2s, 4s, ... with the default
//! policy); every other response is returned as-is on the first attempt.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, warn};

use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::config::RetryConfig;
use crate::constants::retry as retry_constants;
use crate::types::{EwhError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            factor: config.factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable_status(status: u16) -> bool {
        retry_constants::RETRYABLE_STATUSES.contains(&status)
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(self.factor)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Why a single attempt should be retried
#[derive(Debug)]
enum AttemptFailure {
    Throttled(HttpResponse),
    Network(TransportError),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Throttled(response) => write!(f, "HTTP {}", response.status),
            Self::Network(e) => write!(f, "network error: {}", e),
        }
    }
}

/// Send `request`, retrying transient failures according to `policy`.
///
/// - 2xx and non-transient statuses are returned after the first attempt
/// - 429/503 that survive every attempt return the last response unmodified
/// - a transport failure that survives every attempt becomes `TransientUpstream`
pub async fn fetch_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: &RetryPolicy,
    provider: &str,
) -> Result<HttpResponse> {
    let outcome = (|| async move {
        match transport.send(request).await {
            Ok(response) if RetryPolicy::is_retryable_status(response.status) => {
                Err(AttemptFailure::Throttled(response))
            }
            Ok(response) => Ok(response),
            Err(e) => Err(AttemptFailure::Network(e)),
        }
    })
    .retry(policy.backoff())
    .notify(|failure: &AttemptFailure, delay: Duration| {
        warn!(
            provider,
            delay_ms = delay.as_millis() as u64,
            "Transient failure ({}), retrying",
            failure
        );
    })
    .await;

    match outcome {
        Ok(response) => {
            debug!(provider, status = response.status, "Request finished");
            Ok(response)
        }
        Err(AttemptFailure::Throttled(response)) => {
            warn!(
                provider,
                status = response.status,
                attempts = policy.max_attempts,
                "Retries exhausted"
            );
            Ok(response)
        }
        Err(AttemptFailure::Network(e)) => Err(EwhError::TransientUpstream {
            provider: provider.to_string(),
            status: None,
            message: e.to_string(),
        }),
    }
}
