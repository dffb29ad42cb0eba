//! Reliable provider client
//!
//! Every outbound call goes through the same path:
//! validate key → build wire request → queue (throttle) → retry fetcher →
//! status mapping → wire-specific decoding.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use super::{ApiKey, CallOptions, ProviderRequest, ProviderResponse, WireFormat};
use crate::ai::queue::RequestQueue;
use crate::ai::retry::{RetryPolicy, fetch_with_retry};
use crate::ai::transport::HttpTransport;
use crate::types::{EwhError, Result};

pub struct ReliableClient<W: WireFormat> {
    wire: W,
    transport: Arc<dyn HttpTransport>,
    queue: Arc<RequestQueue>,
    retry: RetryPolicy,
}

impl<W: WireFormat> std::fmt::Debug for ReliableClient<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReliableClient")
            .field("provider", &self.wire.name())
            .field("min_interval", &self.queue.min_interval())
            .field("retry", &self.retry)
            .finish()
    }
}

impl<W: WireFormat> ReliableClient<W> {
    pub fn new(
        wire: W,
        transport: Arc<dyn HttpTransport>,
        queue: Arc<RequestQueue>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            wire,
            transport,
            queue,
            retry,
        }
    }

    pub fn name(&self) -> &'static str {
        self.wire.name()
    }

    pub fn wire(&self) -> &W {
        &self.wire
    }

    /// Plain text prompt with the provider's text defaults
    pub async fn call(
        &self,
        prompt: &str,
        key: &ApiKey,
        options: &CallOptions,
    ) -> Result<ProviderResponse> {
        let request = ProviderRequest::text(prompt, options, self.wire.text_defaults());
        self.execute(request, key).await
    }

    /// Send a resolved request through the queue and retry fetcher.
    ///
    /// Request encoding errors (including an unusable key) surface before the
    /// queue is entered, so they never delay other callers.
    #[instrument(skip_all, fields(provider = self.wire.name(), model = %request.model))]
    pub async fn execute(&self, request: ProviderRequest, key: &ApiKey) -> Result<ProviderResponse> {
        let http_request = self.wire.build_request(&request, key)?;
        let provider = self.wire.name();

        self.queue
            .run(|| async {
                let started = Instant::now();
                debug!(prompt_chars = request.prompt.len(), "Sending request");

                let response =
                    fetch_with_retry(self.transport.as_ref(), &http_request, &self.retry, provider)
                        .await?;

                if !response.is_success() {
                    let message = self.wire.error_message(response.status, &response.body);
                    return Err(EwhError::upstream_status(provider, response.status, message));
                }

                let parsed = self.wire.parse_response(&response.body)?;

                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    finish_reason = parsed.raw_finish_reason.as_deref().unwrap_or("-"),
                    output_chars = parsed.text.len(),
                    "{} call completed",
                    provider
                );

                Ok(parsed)
            })
            .await
    }
}
