//! Configuration Types
//!
//! All configuration structures with defaults taken from `constants`.
//! Supports global (~/.config/ewhgen/) and project (.ewhgen/) level configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{gemini, network, openrouter, output, retry};
use crate::types::{EwhError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Gemini provider settings
    pub gemini: GeminiConfig,

    /// OpenRouter provider settings
    pub openrouter: OpenRouterConfig,

    /// Retry-with-backoff settings shared by both providers
    pub retry: RetryConfig,

    /// Model output handling
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            gemini: GeminiConfig::default(),
            openrouter: OpenRouterConfig::default(),
            retry: RetryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `EwhError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(EwhError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.retry.factor < 1.0 {
            return Err(EwhError::Config(format!(
                "retry.factor must be >= 1.0, got {}",
                self.retry.factor
            )));
        }

        if self.gemini.timeout_secs == 0 || self.openrouter.timeout_secs == 0 {
            return Err(EwhError::Config(
                "Provider timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.output.excerpt_chars == 0 {
            return Err(EwhError::Config(
                "output.excerpt_chars must be greater than 0".to_string(),
            ));
        }

        for (name, defaults) in [
            ("gemini.text", &self.gemini.text),
            ("gemini.vision", &self.gemini.vision),
            ("gemini.code_execution", &self.gemini.code_execution),
            ("openrouter.defaults", &self.openrouter.defaults),
        ] {
            defaults.validate(name)?;
        }

        Ok(())
    }
}

// =============================================================================
// Call Defaults
// =============================================================================

/// Model and generation parameters used when a call does not override them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDefaults {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl CallDefaults {
    fn validate(&self, section: &str) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(EwhError::Config(format!("{section}.model must not be empty")));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EwhError::Config(format!(
                "{section}.temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(EwhError::Config(format!(
                "{section}.max_output_tokens must be greater than 0"
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Gemini
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_base: String,
    /// Environment variable holding the API key (read once per call)
    pub api_key_env: String,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
    /// Plain text prompts
    pub text: CallDefaults,
    /// Prompts with an inline PDF attachment
    pub vision: CallDefaults,
    /// Prompts with the code execution tool enabled
    pub code_execution: CallDefaults,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: gemini::API_BASE.to_string(),
            api_key_env: gemini::API_KEY_ENV.to_string(),
            min_interval_ms: gemini::MIN_INTERVAL_MS,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            text: CallDefaults {
                model: gemini::TEXT_MODEL.to_string(),
                temperature: 1.0,
                max_output_tokens: gemini::TEXT_MAX_OUTPUT_TOKENS,
                top_p: 0.95,
                top_k: Some(64),
            },
            vision: CallDefaults {
                model: gemini::VISION_MODEL.to_string(),
                temperature: 1.0,
                max_output_tokens: gemini::VISION_MAX_OUTPUT_TOKENS,
                top_p: 0.95,
                top_k: Some(64),
            },
            code_execution: CallDefaults {
                model: gemini::CODE_EXECUTION_MODEL.to_string(),
                temperature: 0.2,
                max_output_tokens: gemini::CODE_EXECUTION_MAX_OUTPUT_TOKENS,
                top_p: 0.95,
                top_k: Some(40),
            },
        }
    }
}

impl GeminiConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

// =============================================================================
// OpenRouter
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub api_base: String,
    /// Environment variable holding the API key (read once per call)
    pub api_key_env: String,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
    /// Sent as `HTTP-Referer` for OpenRouter app attribution
    pub referer: String,
    /// Sent as `X-Title`
    pub title: String,
    pub defaults: CallDefaults,
    pub pricing: PricingConfig,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_base: openrouter::API_BASE.to_string(),
            api_key_env: openrouter::API_KEY_ENV.to_string(),
            min_interval_ms: openrouter::MIN_INTERVAL_MS,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            referer: openrouter::REFERER.to_string(),
            title: openrouter::TITLE.to_string(),
            defaults: CallDefaults {
                model: openrouter::MODEL.to_string(),
                temperature: openrouter::TEMPERATURE,
                max_output_tokens: openrouter::MAX_OUTPUT_TOKENS,
                top_p: 0.95,
                top_k: None,
            },
            pricing: PricingConfig::default(),
        }
    }
}

impl OpenRouterConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// USD prices used for the estimated cost of a call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million: openrouter::INPUT_PRICE_PER_MILLION,
            output_per_million: openrouter::OUTPUT_PRICE_PER_MILLION,
        }
    }
}

impl PricingConfig {
    pub fn estimate(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 * self.input_per_million / 1_000_000.0)
            + (completion_tokens as f64 * self.output_per_million / 1_000_000.0)
    }
}

// =============================================================================
// Retry & Output
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f32,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay_ms: retry::BASE_DELAY_MS,
            factor: retry::BACKOFF_FACTOR,
            max_delay_ms: retry::MAX_DELAY_SECS * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Characters of offending model output kept in errors
    pub excerpt_chars: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: output::EXCERPT_CHARS,
        }
    }
}
