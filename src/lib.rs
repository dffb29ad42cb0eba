//! ewhgen - Reliable LLM backend core for exam rubric generation
//!
//! Calls Gemini and OpenRouter behind a per-provider throttling queue and a
//! retry-with-backoff fetcher, then recovers structured JSON from whatever
//! the model returned.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ewhgen::{ApiKey, CallOptions, ConfigLoader, GeminiClient, decode_structured};
//!
//! let config = ConfigLoader::load()?;
//! let client = GeminiClient::from_config(&config)?;
//! let key = ApiKey::from_env(&config.gemini.api_key_env)?;
//! let response = client.call(&prompt, &key, &CallOptions::default()).await?;
//! let rubric = decode_structured("Gemini", &response, &["tasks"])?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: Provider clients, queue, retry, JSON repair and decoding
//! - [`config`]: Layered configuration (defaults, files, environment)
//! - [`types`]: Error taxonomy

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, EwhError, Result};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    // Providers
    ApiKey,
    CallOptions,
    FinishReason,
    GeminiClient,
    OpenRouterClient,
    ProviderResponse,
    ReliableClient,
    // Reliability
    RequestQueue,
    RetryPolicy,
    // Decoding
    StructuredDecoder,
    decode_structured,
    repair,
};
