//! LLM Provider Abstraction
//!
//! One reliable client, many wire formats. `ReliableClient<W>` owns the
//! throttling queue and retry policy for a provider; `WireFormat` only knows
//! how to encode a `ProviderRequest` and decode the provider's reply.
//!
//! ## Modules
//!
//! - `client`: Queue + retry + error mapping shared by every provider
//! - `gemini`: Google Gemini `generateContent` (text, PDF vision, code execution)
//! - `openrouter`: OpenRouter chat completions

mod client;
mod gemini;
mod openrouter;

pub use client::ReliableClient;
pub use gemini::{GeminiClient, GeminiWire};
pub use openrouter::{OpenRouterClient, OpenRouterWire};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;

use super::transport::HttpRequest;
use crate::config::CallDefaults;
use crate::types::{EwhError, Result};

// =============================================================================
// Credentials
// =============================================================================

/// Provider API key. Never printed; `Debug` is redacted.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Wrap a key, rejecting empty or whitespace-only values
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EwhError::Config("API key not configured".to_string()));
        }
        Ok(Self(SecretString::from(value)))
    }

    /// Read the key from `var`, failing with a configuration error when unset or empty
    pub fn from_env(var: &str) -> Result<Self> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self(SecretString::from(v)))
            .ok_or_else(|| EwhError::Config(format!("{} not configured", var)))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: Option<u32>,
}

impl From<&CallDefaults> for GenerationConfig {
    fn from(defaults: &CallDefaults) -> Self {
        Self {
            temperature: defaults.temperature,
            max_output_tokens: defaults.max_output_tokens,
            top_p: defaults.top_p,
            top_k: defaults.top_k,
        }
    }
}

/// Inline file sent alongside the prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub mime_type: String,
    pub data_base64: String,
}

impl Attachment {
    pub fn pdf(data_base64: impl Into<String>) -> Self {
        Self {
            mime_type: "application/pdf".to_string(),
            data_base64: data_base64.into(),
        }
    }
}

/// Per-call overrides; anything left `None` falls back to the configured defaults
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

impl CallOptions {
    pub fn resolve(&self, defaults: &CallDefaults) -> (String, GenerationConfig) {
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| defaults.model.clone());
        let generation = GenerationConfig {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_output_tokens: self.max_output_tokens.unwrap_or(defaults.max_output_tokens),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            top_k: self.top_k.or(defaults.top_k),
        };
        (model, generation)
    }
}

/// A fully resolved request, built per call
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub prompt: String,
    pub model: String,
    pub generation: GenerationConfig,
    pub attachment: Option<Attachment>,
    pub code_execution: bool,
}

impl ProviderRequest {
    pub fn text(prompt: impl Into<String>, options: &CallOptions, defaults: &CallDefaults) -> Self {
        let (model, generation) = options.resolve(defaults);
        Self {
            prompt: prompt.into(),
            model,
            generation,
            attachment: None,
            code_execution: false,
        }
    }
}

// =============================================================================
// Response
// =============================================================================

/// Why generation stopped, normalized across providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    /// Output hit the token limit; the text is incomplete
    MaxTokens,
    /// Anything else (safety, recitation, unknown). Empty when the provider sent none.
    Other(String),
}

impl FinishReason {
    pub fn from_gemini(raw: Option<&str>) -> Self {
        match raw {
            Some("STOP") => Self::Complete,
            Some("MAX_TOKENS") => Self::MaxTokens,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(String::new()),
        }
    }

    pub fn from_openai(raw: Option<&str>) -> Self {
        match raw {
            Some("stop") => Self::Complete,
            Some("length") => Self::MaxTokens,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(String::new()),
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::MaxTokens)
    }
}

/// Token usage metrics for cost tracking
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Only providers with configured pricing report a cost
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
}

/// Extra parts returned when the code execution tool was enabled
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodeArtifact {
    Code { language: String, code: String },
    ExecutionResult { outcome: String, output: String },
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// All text parts of the first candidate, concatenated
    pub text: String,
    pub finish_reason: FinishReason,
    /// The provider's own finish reason string, verbatim
    pub raw_finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub code_artifacts: Vec<CodeArtifact>,
}

// =============================================================================
// Wire Format Strategy
// =============================================================================

/// Provider-specific encoding of requests and decoding of responses
pub trait WireFormat: Send + Sync {
    /// Provider name for logs and error messages
    fn name(&self) -> &'static str;

    /// Defaults applied to plain text calls
    fn text_defaults(&self) -> &CallDefaults;

    fn build_request(&self, request: &ProviderRequest, key: &ApiKey) -> Result<HttpRequest>;

    /// Decode a 2xx body. Zero candidates/choices must be `NoCandidates`.
    fn parse_response(&self, body: &str) -> Result<ProviderResponse>;

    /// Message for a non-2xx response: the upstream `error.message` when present
    fn error_message(&self, status: u16, body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("{} API Error: HTTP {}", self.name(), status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_api_key_rejects_empty() {
        assert!(matches!(ApiKey::new(""), Err(EwhError::Config(_))));
        assert!(matches!(ApiKey::new("   "), Err(EwhError::Config(_))));
        assert!(ApiKey::new("abc").is_ok());
    }

    #[test]
    fn test_api_key_from_missing_env() {
        let err = ApiKey::from_env("EWHGEN_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        assert!(err.to_string().contains("EWHGEN_TEST_KEY_THAT_IS_NEVER_SET not configured"));
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret").unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_call_options_override_defaults() {
        let defaults = Config::default().gemini.text;
        let options = CallOptions {
            max_output_tokens: Some(1024),
            temperature: Some(0.0),
            ..Default::default()
        };
        let (model, generation) = options.resolve(&defaults);
        assert_eq!(model, "gemini-2.5-flash");
        assert_eq!(generation.max_output_tokens, 1024);
        // Zero is an explicit choice, not "unset"
        assert_eq!(generation.temperature, 0.0);
        assert_eq!(generation.top_k, Some(64));
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_gemini(Some("STOP")), FinishReason::Complete);
        assert!(FinishReason::from_gemini(Some("MAX_TOKENS")).is_truncated());
        assert_eq!(
            FinishReason::from_gemini(Some("SAFETY")),
            FinishReason::Other("SAFETY".into())
        );
        assert!(FinishReason::from_openai(Some("length")).is_truncated());
        assert_eq!(FinishReason::from_openai(Some("stop")), FinishReason::Complete);
        assert!(!FinishReason::from_openai(None).is_truncated());
    }

    struct NamedWire(CallDefaults);

    impl WireFormat for NamedWire {
        fn name(&self) -> &'static str {
            "Gemini"
        }
        fn text_defaults(&self) -> &CallDefaults {
            &self.0
        }
        fn build_request(&self, _: &ProviderRequest, _: &ApiKey) -> Result<HttpRequest> {
            unreachable!()
        }
        fn parse_response(&self, _: &str) -> Result<ProviderResponse> {
            unreachable!()
        }
    }

    #[test]
    fn test_error_message_prefers_upstream_message() {
        let wire = NamedWire(Config::default().gemini.text);
        assert_eq!(
            wire.error_message(400, r#"{"error":{"code":400,"message":"API key not valid"}}"#),
            "API key not valid"
        );
        assert_eq!(wire.error_message(500, "<html>oops</html>"), "Gemini API Error: HTTP 500");
        assert_eq!(wire.error_message(404, r#"{"error":{}}"#), "Gemini API Error: HTTP 404");
    }
}
