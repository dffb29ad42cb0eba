//! Unified Error Type System
//!
//! Centralized error types for the rubric generation core.
//! Every failure carries enough context to decide whether it may be retried
//! and what to tell the person who submitted the exam.
//!
//! ## Error Categories
//!
//! - **Configuration**: Missing credential or invalid settings (fail fast)
//! - **Transient**: HTTP 429/503 or network failure (retried with backoff)
//! - **Permanent**: Any other upstream failure (surfaced immediately)
//! - **Truncation**: Output cut off at the token limit (never accepted)
//! - **MalformedOutput**: Repaired text still not usable JSON

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories used for retry decisions and user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing credential or invalid configuration - never retried
    Configuration,
    /// Rate limit, unavailable service, or network failure
    Transient,
    /// Upstream rejected the request or returned nothing usable
    Permanent,
    /// Generation stopped at the token limit
    Truncation,
    /// Model output could not be turned into the expected JSON
    MalformedOutput,
    /// Local I/O or serialization failure
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Permanent => write!(f, "PERMANENT"),
            Self::Truncation => write!(f, "TRUNCATION"),
            Self::MalformedOutput => write!(f, "MALFORMED_OUTPUT"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl ErrorCategory {
    /// Only transient failures are worth another attempt against the same provider
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Classify an HTTP status the way the retry fetcher does
    pub fn from_http_status(status: u16) -> Self {
        if crate::constants::retry::RETRYABLE_STATUSES.contains(&status) {
            Self::Transient
        } else {
            Self::Permanent
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum EwhError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Upstream Errors
    // -------------------------------------------------------------------------
    /// Rate limit, 503 or network failure that survived every retry
    #[error("{provider} temporarily unavailable: {message}")]
    TransientUpstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Non-retryable HTTP error; message comes from the upstream body when present
    #[error("{provider} request failed: {message}")]
    PermanentUpstream {
        provider: String,
        status: u16,
        message: String,
    },

    /// Upstream answered 2xx but with an empty candidate/choice list
    #[error("No response from {provider} API")]
    NoCandidates { provider: String },

    /// The response body could not be decoded into the provider's response shape
    #[error("Unexpected response shape from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    // -------------------------------------------------------------------------
    // Output Errors
    // -------------------------------------------------------------------------
    #[error("{provider} output was truncated at the token limit")]
    Truncated { provider: String },

    /// `excerpt` is bounded, see `constants::output::EXCERPT_CHARS`
    #[error("Malformed model output: {reason}")]
    MalformedOutput { reason: String, excerpt: String },
}

pub type Result<T> = std::result::Result<T, EwhError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl EwhError {
    /// Build the error for a non-2xx HTTP response
    pub fn upstream_status(provider: impl Into<String>, status: u16, message: String) -> Self {
        let provider = provider.into();
        match ErrorCategory::from_http_status(status) {
            ErrorCategory::Transient => Self::TransientUpstream {
                provider,
                status: Some(status),
                message,
            },
            _ => Self::PermanentUpstream {
                provider,
                status,
                message,
            },
        }
    }

    /// Build a malformed-output error, keeping at most `max_chars` of the offending text
    pub fn malformed(reason: impl Into<String>, text: &str, max_chars: usize) -> Self {
        Self::MalformedOutput {
            reason: reason.into(),
            excerpt: excerpt(text, max_chars),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::TransientUpstream { .. } => ErrorCategory::Transient,
            Self::PermanentUpstream { .. }
            | Self::NoCandidates { .. }
            | Self::InvalidResponse { .. } => ErrorCategory::Permanent,
            Self::Truncated { .. } => ErrorCategory::Truncation,
            Self::MalformedOutput { .. } => ErrorCategory::MalformedOutput,
            Self::Io(_) | Self::Json(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this error may succeed on another attempt
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Message safe to show to the person who submitted the exam
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(message) => message.clone(),
            Self::TransientUpstream { provider, .. } => {
                format!("{provider} is busy right now, please try again in a moment")
            }
            Self::PermanentUpstream { message, .. } => message.clone(),
            Self::NoCandidates { provider } => format!("No response from {provider} API"),
            Self::InvalidResponse { .. } => "The AI service returned an unexpected response".to_string(),
            Self::Truncated { .. } => {
                "The exam is too long. The AI response was cut off.".to_string()
            }
            Self::MalformedOutput { .. } => "Failed to parse AI response".to_string(),
            Self::Io(e) => format!("I/O error: {e}"),
            Self::Json(e) => format!("JSON error: {e}"),
        }
    }

    /// Actionable follow-up for the user, if any
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Truncated { .. } => {
                Some("Input too long: shorten the exam or split it into parts and retry.")
            }
            Self::MalformedOutput { .. } => Some("The AI returned invalid JSON. Please retry."),
            Self::TransientUpstream { .. } => Some("Rate limit reached. Wait a few seconds and retry."),
            Self::Config(_) => Some("Check that the provider API key environment variable is set."),
            _ => None,
        }
    }
}

/// First `max_chars` characters of `text`, never splitting a UTF-8 sequence
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Transient.to_string(), "TRANSIENT");
        assert_eq!(ErrorCategory::Truncation.to_string(), "TRUNCATION");
        assert_eq!(ErrorCategory::MalformedOutput.to_string(), "MALFORMED_OUTPUT");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
        assert!(!ErrorCategory::Permanent.is_retryable());
        assert!(!ErrorCategory::Truncation.is_retryable());
        assert!(!ErrorCategory::MalformedOutput.is_retryable());
    }

    #[test]
    fn test_upstream_status_classification() {
        let rate_limited = EwhError::upstream_status("Gemini", 429, "slow down".into());
        assert!(matches!(
            rate_limited,
            EwhError::TransientUpstream {
                status: Some(429),
                ..
            }
        ));
        assert!(rate_limited.is_retryable());

        let unavailable = EwhError::upstream_status("Gemini", 503, "overloaded".into());
        assert_eq!(unavailable.category(), ErrorCategory::Transient);

        for status in [400, 401, 404, 500] {
            let err = EwhError::upstream_status("OpenRouter", status, "nope".into());
            assert!(matches!(err, EwhError::PermanentUpstream { .. }));
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_malformed_excerpt_is_bounded() {
        let text = "ä".repeat(5000);
        let err = EwhError::malformed("bad json", &text, 1000);
        match err {
            EwhError::MalformedOutput { excerpt, .. } => {
                assert_eq!(excerpt.chars().count(), 1000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncation_hint() {
        let err = EwhError::Truncated {
            provider: "Gemini".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Truncation);
        assert!(err.hint().unwrap().contains("shorten"));
    }

    #[test]
    fn test_config_user_message_names_the_problem() {
        let err = EwhError::Config("GEMINI_API_KEY not configured".into());
        assert_eq!(err.user_message(), "GEMINI_API_KEY not configured");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_permanent_user_message_is_upstream_message() {
        let err = EwhError::upstream_status("Gemini", 400, "API key not valid".into());
        assert_eq!(err.user_message(), "API key not valid");
    }
}
